/// The in-game user id of a player, stable for one demo.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct UserId(pub i32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Team {
    Unassigned,
    Spectator,
    Terrorist,
    CounterTerrorist,
}

impl Team {
    pub fn from_number(number: i32) -> Self {
        match number {
            1 => Self::Spectator,
            2 => Self::Terrorist,
            3 => Self::CounterTerrorist,
            _ => Self::Unassigned,
        }
    }

    pub fn number(&self) -> i32 {
        match self {
            Self::Unassigned => 0,
            Self::Spectator => 1,
            Self::Terrorist => 2,
            Self::CounterTerrorist => 3,
        }
    }

    /// Whether this is one of the two playing sides.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Terrorist | Self::CounterTerrorist)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::Spectator => "Spectators",
            Self::Terrorist => "Terrorists",
            Self::CounterTerrorist => "Counter-Terrorists",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HitGroup {
    Generic,
    Head,
    Chest,
    Stomach,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
    Neck,
    Gear,
}

impl HitGroup {
    pub fn from_number(number: i32) -> Self {
        match number {
            1 => Self::Head,
            2 => Self::Chest,
            3 => Self::Stomach,
            4 => Self::LeftArm,
            5 => Self::RightArm,
            6 => Self::LeftLeg,
            7 => Self::RightLeg,
            8 => Self::Neck,
            10 => Self::Gear,
            _ => Self::Generic,
        }
    }
}

// https://github.com/markus-wa/demoinfocs-golang/blob/master/pkg/demoinfocs/common/equipment.go
pub static ITEM_DEFINITIONS: phf::Map<i32, &'static str> = phf::phf_map! {
    1_i32 => "deagle",
    2_i32 => "elite",
    3_i32 => "fiveseven",
    4_i32 => "glock",
    7_i32 => "ak47",
    8_i32 => "aug",
    9_i32 => "awp",
    10_i32 => "famas",
    11_i32 => "g3sg1",
    13_i32 => "galilar",
    14_i32 => "m249",
    16_i32 => "m4a1",
    17_i32 => "mac10",
    19_i32 => "p90",
    23_i32 => "mp5sd",
    24_i32 => "ump45",
    25_i32 => "xm1014",
    26_i32 => "bizon",
    27_i32 => "mag7",
    28_i32 => "negev",
    29_i32 => "sawedoff",
    30_i32 => "tec9",
    31_i32 => "taser",
    32_i32 => "hkp2000",
    33_i32 => "mp7",
    34_i32 => "mp9",
    35_i32 => "nova",
    36_i32 => "p250",
    38_i32 => "scar20",
    39_i32 => "sg556",
    40_i32 => "ssg08",
    42_i32 => "knife",
    43_i32 => "flashbang",
    44_i32 => "hegrenade",
    45_i32 => "smokegrenade",
    46_i32 => "molotov",
    47_i32 => "decoy",
    48_i32 => "incgrenade",
    49_i32 => "c4",
    59_i32 => "knife_t",
    60_i32 => "m4a1_silencer",
    61_i32 => "usp_silencer",
    63_i32 => "cz75a",
    64_i32 => "revolver",
};

pub const GRENADES: &[&str] = &[
    "flashbang",
    "hegrenade",
    "smokegrenade",
    "molotov",
    "decoy",
    "incgrenade",
];

/// Damage sources that are not a bullet hitting a player.
pub fn is_utility_damage(weapon: &str) -> bool {
    GRENADES.contains(&weapon) || matches!(weapon, "inferno" | "knife" | "knife_t" | "world")
}
