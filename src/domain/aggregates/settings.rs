//! Site settings singleton (`site_settings`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SITE_NAME: &str = "ORESKY";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlashSale {
    pub active: bool,
    pub title: String,
    pub product_id: String,
    pub end_date: Option<DateTime<Utc>>,
}

impl FlashSale {
    /// Shown only while switched on, pointing at a product, and before its end date.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.product_id.is_empty() && self.end_date.is_some_and(|end| end > now)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutPageContent {
    pub title: String,
    pub subtitle: String,
    pub mission_title: String,
    pub mission_content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroSlide {
    pub image_url: String,
    pub title: String,
    pub subtitle: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThemeColors {
    pub primary: String,
    pub primary_hover: String,
    pub secondary: String,
    pub secondary_hover: String,
    pub accent: String,
    pub neutral: String,
    pub base: String,
    pub text_primary: String,
    pub text_secondary: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#1e40af".into(),
            primary_hover: "#1e3a8a".into(),
            secondary: "#f59e0b".into(),
            secondary_hover: "#d97706".into(),
            accent: "#10b981".into(),
            neutral: "#f1f5f9".into(),
            base: "#ffffff".into(),
            text_primary: "#0f172a".into(),
            text_secondary: "#475569".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteName {
    pub name: String,
}

impl Default for SiteName {
    fn default() -> Self { Self { name: DEFAULT_SITE_NAME.into() } }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub facebook: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub whatsapp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instagram: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub twitter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub github: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub linkedin: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub address: String,
    pub phone: String,
    pub email: String,
    pub hours: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
    pub name: String,
    pub role: String,
    pub bio: String,
    pub image_url: String,
    pub social: SocialLinks,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub flash_sale: FlashSale,
    pub about_page: AboutPageContent,
    pub hero_slides: Vec<HeroSlide>,
    pub theme_colors: ThemeColors,
    pub site_name: SiteName,
    pub social_links: SocialLinks,
    pub contact_info: ContactInfo,
    pub team_members: Vec<TeamMember>,
}

/// Top-level keys of the settings document; each is saved independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSection {
    FlashSale,
    AboutPage,
    HeroSlides,
    ThemeColors,
    SiteName,
    SocialLinks,
    ContactInfo,
    TeamMembers,
}

impl SettingsSection {
    pub fn key(&self) -> &'static str {
        match self {
            Self::FlashSale => "flash_sale",
            Self::AboutPage => "about_page",
            Self::HeroSlides => "hero_slides",
            Self::ThemeColors => "theme_colors",
            Self::SiteName => "site_name",
            Self::SocialLinks => "social_links",
            Self::ContactInfo => "contact_info",
            Self::TeamMembers => "team_members",
        }
    }

    /// Check `value` decodes as this section's shape.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), serde_json::Error> {
        use serde_json::from_value as decode;
        let v = value.clone();
        match self {
            Self::FlashSale => decode::<FlashSale>(v).map(drop),
            Self::AboutPage => decode::<AboutPageContent>(v).map(drop),
            Self::HeroSlides => decode::<Vec<HeroSlide>>(v).map(drop),
            Self::ThemeColors => decode::<ThemeColors>(v).map(drop),
            Self::SiteName => decode::<SiteName>(v).map(drop),
            Self::SocialLinks => decode::<SocialLinks>(v).map(drop),
            Self::ContactInfo => decode::<ContactInfo>(v).map(drop),
            Self::TeamMembers => decode::<Vec<TeamMember>>(v).map(drop),
        }
    }
}

impl fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.key()) }
}

impl FromStr for SettingsSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| format!("unknown settings section: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_missing_sections_default() {
        let s: SiteSettings = serde_json::from_value(json!({"site_name": {"name": "Kora"}})).unwrap();
        assert_eq!(s.site_name.name, "Kora");
        assert_eq!(s.theme_colors, ThemeColors::default());
        assert!(s.hero_slides.is_empty());
        assert_eq!(SiteSettings::default().site_name.name, DEFAULT_SITE_NAME);
    }

    #[test]
    fn test_theme_color_keys_are_hyphenated() {
        let v = serde_json::to_value(ThemeColors::default()).unwrap();
        assert!(v.get("primary-hover").is_some());
        assert!(v.get("text-secondary").is_some());
    }

    #[test]
    fn test_flash_sale_window() {
        let now = Utc::now();
        let mut sale = FlashSale { active: true, title: "Mega".into(), product_id: "P1".into(), end_date: Some(now + Duration::hours(2)) };
        assert!(sale.is_running(now));
        sale.end_date = Some(now - Duration::seconds(1));
        assert!(!sale.is_running(now));
        sale.end_date = None;
        assert!(!sale.is_running(now));
    }

    #[test]
    fn test_section_parse_and_validate() {
        let section: SettingsSection = "hero_slides".parse().unwrap();
        assert_eq!(section, SettingsSection::HeroSlides);
        assert!(section.validate(&json!([{"imageUrl": "a", "title": "t", "subtitle": "s"}])).is_ok());
        assert!(section.validate(&json!({"not": "a list"})).is_err());
        assert!("nope".parse::<SettingsSection>().is_err());
    }
}
