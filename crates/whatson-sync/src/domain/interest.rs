use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category tags shared by event listings and the user's interest picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interest {
    #[serde(rename = "Live Music")]
    LiveMusic,
    #[serde(rename = "Art")]
    Art,
    #[serde(rename = "Electronic Music")]
    ElectronicMusic,
    #[serde(rename = "Open Mic Nights")]
    OpenMicNights,
    #[serde(rename = "Comedy")]
    Comedy,
    #[serde(rename = "Trivia")]
    Trivia,
    #[serde(rename = "Films")]
    Films,
    #[serde(rename = "Yoga/Pilates")]
    YogaPilates,
    #[serde(rename = "Wellness")]
    Wellness,
    #[serde(rename = "Fitness")]
    Fitness,
    #[serde(rename = "Outdoor activities")]
    OutdoorActivities,
    #[serde(rename = "Surfing")]
    Surfing,
    #[serde(rename = "Markets")]
    Markets,
    #[serde(rename = "Beer, Wine & Spirits")]
    BeerWineSpirits,
    #[serde(rename = "Food & Drink Specials")]
    FoodDrinkSpecials,
    #[serde(rename = "Food")]
    Food,
    #[serde(rename = "Workshops")]
    Workshops,
    #[serde(rename = "Community Events")]
    CommunityEvents,
    #[serde(rename = "Fundraisers")]
    Fundraisers,
    #[serde(rename = "Cultural Events")]
    CulturalEvents,
}

impl Interest {
    pub const ALL: [Interest; 20] = [
        Interest::LiveMusic,
        Interest::Art,
        Interest::ElectronicMusic,
        Interest::OpenMicNights,
        Interest::Comedy,
        Interest::Trivia,
        Interest::Films,
        Interest::YogaPilates,
        Interest::Wellness,
        Interest::Fitness,
        Interest::OutdoorActivities,
        Interest::Surfing,
        Interest::Markets,
        Interest::BeerWineSpirits,
        Interest::FoodDrinkSpecials,
        Interest::Food,
        Interest::Workshops,
        Interest::CommunityEvents,
        Interest::Fundraisers,
        Interest::CulturalEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LiveMusic => "Live Music",
            Self::Art => "Art",
            Self::ElectronicMusic => "Electronic Music",
            Self::OpenMicNights => "Open Mic Nights",
            Self::Comedy => "Comedy",
            Self::Trivia => "Trivia",
            Self::Films => "Films",
            Self::YogaPilates => "Yoga/Pilates",
            Self::Wellness => "Wellness",
            Self::Fitness => "Fitness",
            Self::OutdoorActivities => "Outdoor activities",
            Self::Surfing => "Surfing",
            Self::Markets => "Markets",
            Self::BeerWineSpirits => "Beer, Wine & Spirits",
            Self::FoodDrinkSpecials => "Food & Drink Specials",
            Self::Food => "Food",
            Self::Workshops => "Workshops",
            Self::CommunityEvents => "Community Events",
            Self::Fundraisers => "Fundraisers",
            Self::CulturalEvents => "Cultural Events",
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interest: {0}")]
pub struct UnknownInterest(pub String);

impl FromStr for Interest {
    type Err = UnknownInterest;

    /// Exact display string first, then a case-insensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Interest::ALL
            .iter()
            .find(|i| i.as_str() == s)
            .or_else(|| Interest::ALL.iter().find(|i| i.as_str().eq_ignore_ascii_case(s)))
            .copied()
            .ok_or_else(|| UnknownInterest(s.to_string()))
    }
}
