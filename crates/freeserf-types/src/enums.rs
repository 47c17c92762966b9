//! Enumerations for the freeserf simulation kernel: resources, serf types,
//! building types, map object kinds, and the small supporting enums used
//! throughout the other crates.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// One of the 26 resource kinds tracked per inventory, flag slot, and
/// building stock.
///
/// Grouped by role: foods, raw/refined materials, precious metals, military
/// equipment, and the nine tool kinds (`tool_prio` is indexed 0..9 over the
/// last nine variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Resource {
    /// Caught from rivers or coastline.
    Fish = 0,
    /// Raised on a pig farm, consumed by the butcher.
    Pig,
    /// Butchered from a pig.
    Meat,
    /// Grown on a farm.
    Wheat,
    /// Milled from wheat.
    Flour,
    /// Baked from flour.
    Bread,
    /// Felled by a lumberjack.
    Lumber,
    /// Sawn from lumber.
    Plank,
    /// Built by the boat builder; also required to crew a water transport.
    Boat,
    /// Quarried by a stonecutter.
    Stone,
    /// Mined ore, smelted into steel.
    IronOre,
    /// Smelted from iron ore and coal.
    Steel,
    /// Mined fuel for the smelters.
    Coal,
    /// Mined ore, smelted into gold bars.
    GoldOre,
    /// Smelted from gold ore; backs knight occupation economy.
    GoldBar,
    /// Military equipment, made by the weaponsmith.
    Shield,
    /// Military equipment, made by the weaponsmith.
    Sword,
    /// Digger's tool.
    Shovel,
    /// Builder's tool.
    Hammer,
    /// Fisher's tool.
    Rod,
    /// Butcher's tool.
    Cleaver,
    /// Farmer's tool.
    Scythe,
    /// Lumberjack's tool.
    Axe,
    /// Sawmiller's tool.
    Saw,
    /// Miner's tool.
    Pick,
    /// Stonecutter's tool.
    Pincer,
}

impl Resource {
    /// Build a resource from its numeric index 0..26, the same ordering
    /// the arrays above and `flag_prio`/`inventory_prio` are indexed by.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Fish),
            1 => Some(Self::Pig),
            2 => Some(Self::Meat),
            3 => Some(Self::Wheat),
            4 => Some(Self::Flour),
            5 => Some(Self::Bread),
            6 => Some(Self::Lumber),
            7 => Some(Self::Plank),
            8 => Some(Self::Boat),
            9 => Some(Self::Stone),
            10 => Some(Self::IronOre),
            11 => Some(Self::Steel),
            12 => Some(Self::Coal),
            13 => Some(Self::GoldOre),
            14 => Some(Self::GoldBar),
            15 => Some(Self::Shield),
            16 => Some(Self::Sword),
            17 => Some(Self::Shovel),
            18 => Some(Self::Hammer),
            19 => Some(Self::Rod),
            20 => Some(Self::Cleaver),
            21 => Some(Self::Scythe),
            22 => Some(Self::Axe),
            23 => Some(Self::Saw),
            24 => Some(Self::Pick),
            25 => Some(Self::Pincer),
            _ => None,
        }
    }
}

/// The nine tool resources, in `tool_prio` order.
pub const TOOLS: [Resource; 9] = [
    Resource::Shovel,
    Resource::Hammer,
    Resource::Rod,
    Resource::Cleaver,
    Resource::Scythe,
    Resource::Axe,
    Resource::Saw,
    Resource::Pick,
    Resource::Pincer,
];

/// The food resources, treated as a routing group by the transport
/// scheduler (any one of them can satisfy a "needs food" request).
pub const FOODS: [Resource; 3] = [Resource::Fish, Resource::Meat, Resource::Bread];

/// Resource kinds the transport scheduler considers "routable to a
/// building" by resource group (plank, stone, ores, coal, steel, lumber,
/// and the foods as a group) rather than needing a known destination flag.
#[must_use]
pub const fn is_building_routable(resource: Resource) -> bool {
    matches!(
        resource,
        Resource::Plank
        | Resource::Stone
        | Resource::IronOre
        | Resource::Coal
        | Resource::Steel
        | Resource::GoldOre
        | Resource::GoldBar
        | Resource::Lumber
        | Resource::Fish
        | Resource::Meat
        | Resource::Bread
    )
}

// ---------------------------------------------------------------------------
// Serf types
// ---------------------------------------------------------------------------

/// The 27 serf kinds, indexed by `Inventory::serfs`.
///
/// `Reserved4` corresponds to the original engine's unused `SERF_4` slot
/// (see DESIGN.md for the decision not to guess at its intended role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SerfType {
    /// Shuttles one resource at a time along a single road segment.
    Transporter = 0,
    /// A transporter specialized for water segments.
    Sailor,
    /// Levels building sites.
    Digger,
    /// Constructs buildings.
    Builder,
    /// Unused historically; reserved to keep the 27-entry layout stable.
    Reserved4,
    /// Fells trees.
    Lumberjack,
    /// Saws lumber into planks.
    Sawmiller,
    /// Quarries stone.
    Stonecutter,
    /// Plants new trees.
    Forester,
    /// Works a mine.
    Miner,
    /// Works a smelter.
    Smelter,
    /// Works a fisher's hut.
    Fisher,
    /// Raises pigs.
    PigFarmer,
    /// Butchers pigs into meat.
    Butcher,
    /// Works a farm.
    Farmer,
    /// Mills wheat into flour.
    Miller,
    /// Bakes bread.
    Baker,
    /// Builds boats.
    BoatBuilder,
    /// Makes tools.
    ToolMaker,
    /// Makes swords and shields.
    WeaponSmith,
    /// Samples ground for deposits.
    Geologist,
    /// Idle serf in an inventory, not yet specialized.
    Generic,
    /// Rank-0 knight.
    Knight0,
    /// Rank-1 knight.
    Knight1,
    /// Rank-2 knight.
    Knight2,
    /// Rank-3 knight.
    Knight3,
    /// Rank-4 knight.
    Knight4,
}

/// The five knight ranks, in ascending strength order.
pub const KNIGHT_RANKS: [SerfType; 5] = [
    SerfType::Knight0,
    SerfType::Knight1,
    SerfType::Knight2,
    SerfType::Knight3,
    SerfType::Knight4,
];

impl SerfType {
    /// The combat level of a knight rank (0..5), used by the duel
    /// resolution in `KNIGHT_ATTACKING`/`KNIGHT_DEFENDING`. Non-knight
    /// types have no defined combat level.
    #[must_use]
    pub const fn knight_level(self) -> Option<u8> {
        match self {
            Self::Knight0 => Some(0),
            Self::Knight1 => Some(1),
            Self::Knight2 => Some(2),
            Self::Knight3 => Some(3),
            Self::Knight4 => Some(4),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Building types
// ---------------------------------------------------------------------------

/// One of the 24 building types. `Castle` is unique per player and is
/// excluded from the per-type completed/incomplete building counts (see
/// `PlayerState::building_counts`, a 23-entry table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuildingType {
    /// The player's home base; houses an inventory and the initial garrison.
    Castle = 0,
    /// A storage depot; houses an inventory.
    Stock,
    /// Smallest military building.
    Hut,
    /// Medium military building.
    Tower,
    /// Largest military building.
    Fortress,
    /// Fells nearby trees.
    Lumberjack,
    /// Saws lumber into planks.
    Sawmill,
    /// Quarries nearby stone.
    Stonecutter,
    /// Plants new trees to replenish a lumberjack's range.
    Forester,
    /// Catches fish from adjacent water.
    Fisher,
    /// Extracts stone from a ground deposit.
    StoneMine,
    /// Extracts coal from a ground deposit.
    CoalMine,
    /// Extracts iron ore from a ground deposit.
    IronMine,
    /// Extracts gold ore from a ground deposit.
    GoldMine,
    /// Smelts iron ore and coal into steel.
    SteelSmelter,
    /// Smelts gold ore into gold bars.
    GoldSmelter,
    /// Grows wheat.
    Farm,
    /// Mills wheat into flour.
    Mill,
    /// Bakes bread from flour.
    Bakery,
    /// Butchers pigs into meat.
    Butcher,
    /// Raises pigs on wheat.
    PigFarm,
    /// Builds boats for water transport.
    BoatBuilder,
    /// Makes tools from planks and steel.
    ToolMaker,
    /// Makes swords and shields from steel and coal.
    WeaponSmith,
}

/// Building types that maintain a knight garrison.
pub const MILITARY_BUILDINGS: [BuildingType; 4] = [
    BuildingType::Hut,
    BuildingType::Tower,
    BuildingType::Fortress,
    BuildingType::Castle,
];

impl BuildingType {
    /// Build a building type from its numeric index 0..24.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Castle),
            1 => Some(Self::Stock),
            2 => Some(Self::Hut),
            3 => Some(Self::Tower),
            4 => Some(Self::Fortress),
            5 => Some(Self::Lumberjack),
            6 => Some(Self::Sawmill),
            7 => Some(Self::Stonecutter),
            8 => Some(Self::Forester),
            9 => Some(Self::Fisher),
            10 => Some(Self::StoneMine),
            11 => Some(Self::CoalMine),
            12 => Some(Self::IronMine),
            13 => Some(Self::GoldMine),
            14 => Some(Self::SteelSmelter),
            15 => Some(Self::GoldSmelter),
            16 => Some(Self::Farm),
            17 => Some(Self::Mill),
            18 => Some(Self::Bakery),
            19 => Some(Self::Butcher),
            20 => Some(Self::PigFarm),
            21 => Some(Self::BoatBuilder),
            22 => Some(Self::ToolMaker),
            23 => Some(Self::WeaponSmith),
            _ => None,
        }
    }

    /// Whether this building type maintains a knight garrison.
    #[must_use]
    pub const fn is_military(self) -> bool {
        matches!(
            self,
            Self::Hut | Self::Tower | Self::Fortress | Self::Castle
        )
    }

    /// Whether this building type owns an [`Inventory`](crate) rather than
    /// terminating at a plain flag link.
    #[must_use]
    pub const fn has_inventory(self) -> bool {
        matches!(self, Self::Castle | Self::Stock)
    }

    /// The military influence contributed at distance class `dist` (0..10)
    /// from a building of this type, indexed as `military_influence[10 *
    /// type_rank + dist_class]` in the. `type_rank` is 0 for
    /// Hut, 1 for Tower, 2 for Fortress (Castle shares Fortress's table).
    #[must_use]
    pub const fn influence_rank(self) -> Option<u8> {
        match self {
            Self::Hut => Some(0),
            Self::Tower => Some(1),
            Self::Fortress | Self::Castle => Some(2),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Map object kinds
// ---------------------------------------------------------------------------

/// A kind of sign planted by a geologist, recording a prospected deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignKind {
    /// Large gold deposit.
    LargeGold,
    /// Small gold deposit.
    SmallGold,
    /// Large iron deposit.
    LargeIron,
    /// Small iron deposit.
    SmallIron,
    /// Large coal deposit.
    LargeCoal,
    /// Small coal deposit.
    SmallCoal,
    /// Large stone deposit.
    LargeStone,
    /// Small stone deposit.
    SmallStone,
    /// No deposit found here.
    Empty,
}

/// What occupies a map tile.
///
/// Variants that originally differed only by an animation stage (tree
/// growth, field cycling, felling animation) carry that stage as a payload
/// rather than being enumerated individually, per the sum-type guidance for
/// the source's packed object-kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Empty tile.
    None,
    /// A road-network flag.
    Flag,
    /// A small building (most production buildings).
    SmallBuilding,
    /// A large building (mines, smelters, farm, etc.).
    LargeBuilding,
    /// The castle.
    Castle,
    /// Deciduous tree, growth stage 0..8 (8 = full grown).
    Tree(u8),
    /// Pine tree, growth stage 0..8.
    Pine(u8),
    /// Palm tree, growth stage 0..4.
    Palm(u8),
    /// Water-adjacent tree, growth stage 0..4.
    WaterTree(u8),
    /// Small loose stone, variant 0..8.
    Stone(u8),
    /// Sandstone formation, variant 0..2.
    Sandstone(u8),
    /// A large standalone stone, distinct from the `Stone` variants.
    BigStone,
    /// A large standalone sandstone formation.
    BigSandstone,
    /// A wayside cross.
    Cross,
    /// A felled tree's stub.
    Stub,
    /// Serf cadaver, variant 0..2 (decays over time).
    Cadaver(u8),
    /// Underwater stone, variant 0..2.
    WaterStone(u8),
    /// Desert cactus, variant 0..2.
    Cactus(u8),
    /// A dead, leafless tree.
    DeadTree,
    /// A felled pine, decay stage 0..5.
    FelledPine(u8),
    /// A felled deciduous tree, decay stage 0..5.
    FelledTree(u8),
    /// A sapling pine just planted by a forester.
    NewPine,
    /// A sapling tree just planted by a forester.
    NewTree,
    /// A wheat field, growth stage 0..6.
    Seeds(u8),
    /// A wheat field past its harvest window.
    FieldExpired,
    /// A geologist's prospecting sign (decays over time).
    Sign(SignKind),
    /// A harvestable wheat field, stage 0..6.
    Field(u8),
}

impl ObjectKind {
    /// Whether a serf can walk onto this tile (an "open" or "filled" map
    /// space in the original's terminology), i.e. nothing solid is built
    /// here.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(
            self,
            Self::Flag | Self::SmallBuilding | Self::LargeBuilding | Self::Castle
        )
    }
}

// ---------------------------------------------------------------------------
// Ground deposits
// ---------------------------------------------------------------------------

/// What kind of ground resource a tile's deposit field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroundDeposit {
    /// No deposit.
    None,
    /// Gold ore.
    Gold,
    /// Iron ore.
    Iron,
    /// Coal.
    Coal,
    /// Stone.
    Stone,
}

// ---------------------------------------------------------------------------
// Small supporting enums
// ---------------------------------------------------------------------------

/// An inventory's resource or serf flow mode for a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlowMode {
    /// Accept incoming stock/serfs.
    #[default]
    In,
    /// Neither accept nor dispatch.
    Stop,
    /// Dispatch stock/serfs to the road network.
    Out,
}

/// A realm's threat level, 0 (deep interior) to 3 (border), derived from
/// Chebyshev distance to the nearest enemy-owned tile. Drives garrison
/// minimums via `Player::knight_occupation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLevel {
    /// Distance class 0: deep in friendly territory.
    Interior = 0,
    /// Distance class 1.
    Low = 1,
    /// Distance class 2.
    Medium = 2,
    /// Distance class 3: directly on the border.
    Border = 3,
}

impl ThreatLevel {
    /// Clamp a raw Chebyshev distance to a threat level.
    #[must_use]
    pub const fn from_distance(distance: u32) -> Self {
        match distance {
            0 => Self::Interior,
            1 => Self::Low,
            2 => Self::Medium,
            _ => Self::Border,
        }
    }

    /// This level's numeric index, for indexing `knight_occupation`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A category of player notification, appended to the per-player queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A mine's ground deposit has been exhausted.
    MineEmpty,
    /// A new stock (storage building) has finished construction.
    NewStockBuilt,
    /// A military building is under attack.
    UnderAttack,
    /// Territory was lost to another player.
    LostLand,
    /// A geologist found gold.
    FoundGold,
    /// A geologist found iron.
    FoundIron,
    /// A geologist found coal.
    FoundCoal,
    /// A geologist found stone.
    FoundStone,
    /// The emergency program (food rationing) was activated.
    EmergencyProgramActivated,
    /// The emergency program was neutralized.
    EmergencyProgramNeutralized,
    /// A knight combat round was won.
    VictoryFight,
    /// A knight combat round was lost.
    DefeatFight,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_priority_table_has_nine_entries() {
        assert_eq!(TOOLS.len(), 9);
    }

    #[test]
    fn knight_levels_are_monotonic() {
        let levels: Vec<u8> = KNIGHT_RANKS
        .iter()
        .filter_map(|k| k.knight_level())
        .collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn threat_level_clamps_at_border() {
        assert_eq!(ThreatLevel::from_distance(99), ThreatLevel::Border);
        assert_eq!(ThreatLevel::from_distance(0), ThreatLevel::Interior);
    }

    #[test]
    fn military_buildings_match_is_military() {
        for b in MILITARY_BUILDINGS {
            assert!(b.is_military());
        }
        assert!(!BuildingType::Sawmill.is_military());
    }

    #[test]
    fn resource_from_index_round_trips_every_variant() {
        for idx in 0..26u8 {
            assert_eq!(Resource::from_index(idx).map(|r| r as u8), Some(idx));
        }
        assert_eq!(Resource::from_index(26), None);
    }

    #[test]
    fn building_type_from_index_round_trips_every_variant() {
        for idx in 0..24u8 {
            assert_eq!(BuildingType::from_index(idx).map(|b| b as u8), Some(idx));
        }
        assert_eq!(BuildingType::from_index(24), None);
    }
}
