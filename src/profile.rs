//! User profile data model and validation.
//!
//! Every field is either absent (not yet collected) or holds a value that
//! passed its validation rule. Invalid values are never stored — the
//! collection stage routes them back into `missing_fields` instead.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gender, with Hebrew and English surface forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Hebrew surface form, used when building Hebrew prompts.
    pub fn hebrew(&self) -> &'static str {
        match self {
            Self::Male => "זכר",
            Self::Female => "נקבה",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "זכר" => Ok(Self::Male),
            "female" | "נקבה" => Ok(Self::Female),
            _ => Err(()),
        }
    }
}

/// Israeli health fund (HMO), one of the three enumerated providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmoName {
    Maccabi,
    Meuhedet,
    Clalit,
}

impl HmoName {
    pub fn hebrew(&self) -> &'static str {
        match self {
            Self::Maccabi => "מכבי",
            Self::Meuhedet => "מאוחדת",
            Self::Clalit => "כללית",
        }
    }
}

impl fmt::Display for HmoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maccabi => write!(f, "Maccabi"),
            Self::Meuhedet => write!(f, "Meuhedet"),
            Self::Clalit => write!(f, "Clalit"),
        }
    }
}

impl FromStr for HmoName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maccabi" | "מכבי" => Ok(Self::Maccabi),
            "meuhedet" | "מאוחדת" => Ok(Self::Meuhedet),
            "clalit" | "כללית" => Ok(Self::Clalit),
            _ => Err(()),
        }
    }
}

/// Insurance membership tier, one of the three enumerated levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTier {
    Gold,
    Silver,
    Bronze,
}

impl MembershipTier {
    pub fn hebrew(&self) -> &'static str {
        match self {
            Self::Gold => "זהב",
            Self::Silver => "כסף",
            Self::Bronze => "ארד",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gold => write!(f, "gold"),
            Self::Silver => write!(f, "silver"),
            Self::Bronze => write!(f, "bronze"),
        }
    }
}

impl FromStr for MembershipTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gold" | "זהב" => Ok(Self::Gold),
            "silver" | "כסף" => Ok(Self::Silver),
            "bronze" | "ארד" => Ok(Self::Bronze),
            _ => Err(()),
        }
    }
}

// Wire form: enums travel as their canonical English string but accept
// either language on the way in.
macro_rules! string_enum_serde {
    ($ty:ty, $expected:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse()
                    .map_err(|_| D::Error::custom(format!("{}: {s:?}", $expected)))
            }
        }
    };
}

string_enum_serde!(Gender, "expected male/female (or זכר/נקבה)");
string_enum_serde!(HmoName, "expected Maccabi/Meuhedet/Clalit (or מכבי/מאוחדת/כללית)");
string_enum_serde!(MembershipTier, "expected gold/silver/bronze (or זהב/כסף/ארד)");

/// The seven collected profile fields, in wire (snake_case) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FullName,
    IdNumber,
    Gender,
    Age,
    HmoName,
    HmoCardNumber,
    MembershipTier,
}

impl ProfileField {
    /// All seven fields in collection order.
    pub const ALL: [ProfileField; 7] = [
        Self::FullName,
        Self::IdNumber,
        Self::Gender,
        Self::Age,
        Self::HmoName,
        Self::HmoCardNumber,
        Self::MembershipTier,
    ];
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FullName => "full_name",
            Self::IdNumber => "id_number",
            Self::Gender => "gender",
            Self::Age => "age",
            Self::HmoName => "hmo_name",
            Self::HmoCardNumber => "hmo_card_number",
            Self::MembershipTier => "membership_tier",
        };
        write!(f, "{s}")
    }
}

/// Check the 9-decimal-digit rule shared by `id_number` and
/// `hmo_card_number`.
pub fn is_nine_digits(s: &str) -> bool {
    s.len() == 9 && s.chars().all(|c| c.is_ascii_digit())
}

/// Age range accepted by the collection stage (inclusive).
pub const MAX_AGE: u8 = 120;

/// Validated user profile.
///
/// Created empty at session start and filled in one collection turn at a
/// time. `is_confirmed` may only be true when all seven fields are present.
///
/// Deserialization goes through `ProfileWire` and enforces the same rules
/// as the collection stage: a profile arriving over the wire can never
/// hold an invalid value either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProfileWire")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmo_name: Option<HmoName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmo_card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_tier: Option<MembershipTier>,
    pub is_confirmed: bool,
}

/// Raw wire form of a profile, before the field rules are checked.
#[derive(Debug, Deserialize)]
struct ProfileWire {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    id_number: Option<String>,
    #[serde(default)]
    gender: Option<Gender>,
    #[serde(default)]
    age: Option<i64>,
    #[serde(default)]
    hmo_name: Option<HmoName>,
    #[serde(default)]
    hmo_card_number: Option<String>,
    #[serde(default)]
    membership_tier: Option<MembershipTier>,
    #[serde(default)]
    is_confirmed: bool,
}

impl TryFrom<ProfileWire> for UserProfile {
    type Error = String;

    fn try_from(wire: ProfileWire) -> Result<Self, Self::Error> {
        if let Some(ref id) = wire.id_number
            && !is_nine_digits(id)
        {
            return Err(format!("id_number must be exactly 9 digits, got {id:?}"));
        }
        if let Some(ref card) = wire.hmo_card_number
            && !is_nine_digits(card)
        {
            return Err(format!("hmo_card_number must be exactly 9 digits, got {card:?}"));
        }
        let age = match wire.age {
            Some(a) if (0..=i64::from(MAX_AGE)).contains(&a) => Some(a as u8),
            Some(a) => return Err(format!("age must be between 0 and {MAX_AGE}, got {a}")),
            None => None,
        };

        let mut profile = UserProfile {
            full_name: wire.full_name,
            id_number: wire.id_number,
            gender: wire.gender,
            age,
            hmo_name: wire.hmo_name,
            hmo_card_number: wire.hmo_card_number,
            membership_tier: wire.membership_tier,
            is_confirmed: false,
        };
        // Same gate as absorb: a confirmation claim only holds on a
        // complete profile.
        profile.is_confirmed = wire.is_confirmed && profile.is_complete();
        Ok(profile)
    }
}

impl UserProfile {
    /// Fields not yet collected (or collected but invalid, hence absent).
    pub fn missing_fields(&self) -> Vec<ProfileField> {
        let mut missing = Vec::new();
        if self.full_name.is_none() {
            missing.push(ProfileField::FullName);
        }
        if self.id_number.is_none() {
            missing.push(ProfileField::IdNumber);
        }
        if self.gender.is_none() {
            missing.push(ProfileField::Gender);
        }
        if self.age.is_none() {
            missing.push(ProfileField::Age);
        }
        if self.hmo_name.is_none() {
            missing.push(ProfileField::HmoName);
        }
        if self.hmo_card_number.is_none() {
            missing.push(ProfileField::HmoCardNumber);
        }
        if self.membership_tier.is_none() {
            missing.push(ProfileField::MembershipTier);
        }
        missing
    }

    /// Whether all seven fields are present (and therefore valid).
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Merge a candidate profile from one collection turn into this one.
    ///
    /// Candidate fields add or correct; an absent candidate field never
    /// clears a previously collected value. The confirmation flag is
    /// re-derived through the gate: the candidate's claim only holds when
    /// the merged profile is complete.
    pub fn absorb(&mut self, candidate: &UserProfile) {
        if let Some(ref v) = candidate.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(ref v) = candidate.id_number {
            self.id_number = Some(v.clone());
        }
        if let Some(v) = candidate.gender {
            self.gender = Some(v);
        }
        if let Some(v) = candidate.age {
            self.age = Some(v);
        }
        if let Some(v) = candidate.hmo_name {
            self.hmo_name = Some(v);
        }
        if let Some(ref v) = candidate.hmo_card_number {
            self.hmo_card_number = Some(v.clone());
        }
        if let Some(v) = candidate.membership_tier {
            self.membership_tier = Some(v);
        }
        self.is_confirmed = candidate.is_confirmed && self.is_complete();
    }
}
