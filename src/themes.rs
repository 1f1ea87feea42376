// src/themes.rs
//! Static theme catalogue. Themes are plain data; the prompt builder
//! switches over [`TemplateKey`] to pick an instruction branch.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::models::PromptVariant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Decades,
    ImpossibleSelfies,
    HairStyler,
    Headshots,
    EightiesMall,
    StyleLookbook,
    Figurines,
    MizoAttire,
    PhotoRestoration,
    PixarStyle,
    Celebrity,
    KeychainCreator,
    /// Anything not in the catalogue. Only the generic prompt applies.
    Unknown(String),
}

impl TemplateKey {
    pub fn as_str(&self) -> &str {
        match self {
            TemplateKey::Decades => "decades",
            TemplateKey::ImpossibleSelfies => "impossibleSelfies",
            TemplateKey::HairStyler => "hairStyler",
            TemplateKey::Headshots => "headshots",
            TemplateKey::EightiesMall => "eightiesMall",
            TemplateKey::StyleLookbook => "styleLookbook",
            TemplateKey::Figurines => "figurines",
            TemplateKey::MizoAttire => "mizoAttire",
            TemplateKey::PhotoRestoration => "photoRestoration",
            TemplateKey::PixarStyle => "pixarStyle",
            TemplateKey::Celebrity => "celebrity",
            TemplateKey::KeychainCreator => "keychainCreator",
            TemplateKey::Unknown(name) => name,
        }
    }
}

impl FromStr for TemplateKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim() {
            "decades" => TemplateKey::Decades,
            "impossibleSelfies" => TemplateKey::ImpossibleSelfies,
            "hairStyler" => TemplateKey::HairStyler,
            "headshots" => TemplateKey::Headshots,
            "eightiesMall" => TemplateKey::EightiesMall,
            "styleLookbook" => TemplateKey::StyleLookbook,
            "figurines" => TemplateKey::Figurines,
            "mizoAttire" => TemplateKey::MizoAttire,
            "photoRestoration" => TemplateKey::PhotoRestoration,
            "pixarStyle" => TemplateKey::PixarStyle,
            "celebrity" => TemplateKey::Celebrity,
            "keychainCreator" => TemplateKey::KeychainCreator,
            other => TemplateKey::Unknown(other.to_string()),
        };
        Ok(key)
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra input a theme needs before a batch may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeRequirement {
    None,
    LookbookStyle,
    Hairstyle,
    CelebrityName,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub key: TemplateKey,
    pub name: &'static str,
    pub description: &'static str,
    pub polaroid: bool,
    /// Whether the framed download prints the variant label.
    pub labelled_frame: bool,
    pub requirement: ThemeRequirement,
    pub styles: &'static [&'static str],
    /// Brief for the one-off shared style descriptor, if the theme uses one.
    pub shared_style_brief: Option<&'static str>,
    pub prompts: Vec<PromptVariant>,
}

impl Theme {
    fn new(key: TemplateKey, name: &'static str, description: &'static str) -> Self {
        Self {
            key,
            name,
            description,
            polaroid: false,
            labelled_frame: false,
            requirement: ThemeRequirement::None,
            styles: &[],
            shared_style_brief: None,
            prompts: Vec::new(),
        }
    }

    fn polaroid(mut self) -> Self {
        self.polaroid = true;
        self
    }

    fn labelled(mut self) -> Self {
        self.labelled_frame = true;
        self
    }

    fn requires(mut self, requirement: ThemeRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    fn styles(mut self, styles: &'static [&'static str]) -> Self {
        self.styles = styles;
        self
    }

    fn shared_style(mut self, brief: &'static str) -> Self {
        self.shared_style_brief = Some(brief);
        self
    }

    fn prompts(mut self, prompts: &[(&str, &str)]) -> Self {
        self.prompts = prompts
            .iter()
            .map(|(id, base)| PromptVariant::new(*id, *base))
            .collect();
        self
    }
}

pub const LOOKBOOK_STYLES: &[&str] = &[
    "Streetwear",
    "Vintage",
    "Goth",
    "Minimalist",
    "Old Money",
    "90s Grunge",
];

pub static CATALOGUE: LazyLock<Vec<Theme>> = LazyLock::new(|| {
    vec![
        Theme::new(
            TemplateKey::PhotoRestoration,
            "Photo Restoration",
            "Repair and enhance old photographs.",
        )
        .prompts(&[
            ("Colorize", "Colorize this black and white photo with realistic, natural colors."),
            ("Repair Damage", "Repair physical damage like cracks, scratches, dust, and tears from this photo."),
            ("Enhance Clarity", "Improve the overall sharpness, clarity, and focus of this slightly blurry photo."),
        ]),
        Theme::new(
            TemplateKey::PixarStyle,
            "Pixar-style Me",
            "Become a 3D animated character.",
        )
        .labelled()
        .prompts(&[
            ("Adventurer", "as a brave adventurer in a lush, magical jungle."),
            ("Scientist", "as a quirky scientist in a chaotic, colorful laboratory."),
            ("Musician", "as a passionate musician on a brightly lit stage."),
        ]),
        Theme::new(
            TemplateKey::Celebrity,
            "Stand with a Celebrity",
            "Pose with your favorite star, in new scenes or in your original photo.",
        )
        .requires(ThemeRequirement::CelebrityName)
        .prompts(&[
            ("Red Carpet", "posing together on a glamorous red carpet at a movie premiere. {celebrity} is standing next to the person."),
            ("Coffee Shop", "casually chatting and laughing with {celebrity} at a cozy, stylish coffee shop."),
            ("Side-by-Side", "Add {celebrity} into the photo, standing realistically right next to the person, smiling for the camera."),
            ("Photobomb", "{celebrity} is photobombing the person from the original photo in a funny, playful way."),
        ]),
        Theme::new(
            TemplateKey::MizoAttire,
            "Mizo Traditional Attire",
            "Elegant portraits in traditional Mizo garments.",
        )
        .prompts(&[
            ("Puanchei", "a Puanchei, the most colourful Mizo costume."),
            ("Kawrchei", "a Kawrchei, a beautiful blouse."),
            ("Ngotekherh", "a Ngotekherh, a traditional Mizo puan."),
        ]),
        Theme::new(
            TemplateKey::Figurines,
            "Toys Miniature Me",
            "Your own collectible figurines.",
        )
        .prompts(&[
            ("Vinyl Figure", "A stylized collectible vinyl art toy of the person with minimalist features, standing on a shelf filled with other similar toys."),
            ("Plushy Figure", "A soft, cute plushy figure of the person with detailed fabric texture and stitching, sitting on a neatly made bed."),
            ("Bobblehead", "A realistic bobblehead figure of the person with an oversized head, displayed on a polished wooden desk next to a computer keyboard."),
        ]),
        Theme::new(
            TemplateKey::KeychainCreator,
            "Keychain Creator",
            "A realistic product photo of a keychain of you.",
        )
        .prompts(&[("Keychain", "")]),
        Theme::new(
            TemplateKey::Decades,
            "Time Traveler",
            "See yourself through the decades.",
        )
        .polaroid()
        .labelled()
        .prompts(&[
            ("1970s", "A 1970s style portrait."),
            ("1980s", "An 1980s style portrait."),
            ("1990s", "A 1990s style portrait."),
        ]),
        Theme::new(
            TemplateKey::StyleLookbook,
            "Style Lookbook",
            "Your personal fashion photoshoot.",
        )
        .requires(ThemeRequirement::LookbookStyle)
        .styles(LOOKBOOK_STYLES)
        .prompts(&[
            ("Look 1", "a full-body shot, standing"),
            ("Look 2", "a half-body shot, smiling"),
            ("Look 3", "a candid walking shot"),
        ]),
        Theme::new(
            TemplateKey::EightiesMall,
            "'80s Mall Shoot",
            "Totally tubular 1980s portraits.",
        )
        .polaroid()
        .shared_style("A specific, creative, and detailed style for an 80s mall portrait studio photoshoot.")
        .prompts(&[
            ("Glamour Shot", "a classic glamour shot pose with soft focus and dramatic lighting."),
            ("Casual Pose", "casually leaning against a neon sign with a cool, relaxed expression."),
            ("Action Pose", "a fun action pose, like jumping in the air or playing an air guitar."),
        ]),
        Theme::new(
            TemplateKey::HairStyler,
            "Hair Styler",
            "Try on new hairstyles and colors.",
        )
        .labelled()
        .requires(ThemeRequirement::Hairstyle)
        .prompts(&[
            ("Short", "a chic short haircut"),
            ("Medium", "a stylish medium-length haircut"),
            ("Long", "beautiful long hair"),
            ("Bob", "a classic bob haircut"),
            ("Pixie", "a trendy pixie cut"),
            ("Curls", "vibrant, bouncy curls"),
        ]),
        Theme::new(
            TemplateKey::ImpossibleSelfies,
            "Impossible Pics",
            "Photos that defy reality.",
        )
        .labelled()
        .prompts(&[
            ("Moon", "taking a selfie on the surface of the moon with Earth in the background."),
            ("Dinosaur", "running away from a giant T-Rex in a prehistoric jungle."),
            ("Underwater", "exploring a vibrant coral reef surrounded by colorful fish in a sunken city."),
        ]),
        Theme::new(
            TemplateKey::Headshots,
            "Pro Headshots",
            "Professional profile pictures.",
        )
        .prompts(&[
            ("Corporate", "wearing professional business attire (like a suit jacket or blouse)"),
            ("Creative", "wearing smart-casual attire (like a stylish sweater or button-down shirt)"),
            ("Tech", "wearing a clean, modern outfit (like a simple t-shirt or polo shirt)"),
        ]),
    ]
});

pub fn find_theme(key: &TemplateKey) -> Option<&'static Theme> {
    CATALOGUE.iter().find(|theme| &theme.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_catalogue_key_round_trips_through_its_name() {
        for theme in CATALOGUE.iter() {
            let parsed: TemplateKey = theme.key.as_str().parse().unwrap();
            assert_eq!(parsed, theme.key);
            assert!(find_theme(&parsed).is_some());
        }
    }

    #[test]
    fn unknown_names_have_no_theme() {
        let key: TemplateKey = "vaporwave".parse().unwrap();
        assert_eq!(key, TemplateKey::Unknown("vaporwave".to_string()));
        assert!(find_theme(&key).is_none());
    }

    #[test]
    fn variant_ids_are_unique_within_each_theme() {
        for theme in CATALOGUE.iter() {
            let ids: HashSet<_> = theme.prompts.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids.len(), theme.prompts.len(), "duplicate in {}", theme.key);
        }
    }

    #[test]
    fn only_eighties_mall_shares_a_style() {
        let shared: Vec<_> = CATALOGUE
            .iter()
            .filter(|t| t.shared_style_brief.is_some())
            .map(|t| t.key.clone())
            .collect();
        assert_eq!(shared, vec![TemplateKey::EightiesMall]);
    }
}
