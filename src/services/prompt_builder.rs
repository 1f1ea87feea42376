// src/services/prompt_builder.rs
use crate::models::{GenerationOptions, HeadshotPose, PromptVariant};
use crate::themes::TemplateKey;

pub const LIKENESS_PREAMBLE: &str = "The highest priority is to maintain the exact facial features, likeness, perceived gender, and composition of the person in the provided reference photo. Do not alter the person's core facial structure.";

pub const CELEBRITY_TOKEN: &str = "{celebrity}";

pub const DEFAULT_KEYCHAIN_LABEL: &str = "Themebooth";

const TEXTURE_PRESERVING_HAIRSTYLES: &[&str] = &["Short", "Medium", "Long"];
const IN_PHOTO_CELEBRITY_VARIANTS: &[&str] = &["Photobomb", "Side-by-Side"];

/// Builds the instruction sent alongside the source photo. Pure: the same
/// inputs always produce the same string.
pub fn build_instruction(
    template: &TemplateKey,
    variant: &PromptVariant,
    options: &GenerationOptions,
) -> String {
    let base = LIKENESS_PREAMBLE;

    match template {
        TemplateKey::Decades => format!(
            "{base} Change the person's hair, clothing, accessories, and the photo's background to match the style of the {}.",
            variant.id
        ),
        TemplateKey::ImpossibleSelfies => format!(
            "{base} Place the person into the following scene, changing their clothing, hair, and the background to match: {}.",
            variant.base
        ),
        TemplateKey::HairStyler => hair_instruction(variant, options),
        TemplateKey::Headshots => {
            let pose = match options.headshot_pose {
                HeadshotPose::Forward => "facing forward towards the camera",
                HeadshotPose::Angled => "posed at a slight angle to the camera",
            };
            format!(
                "{base} Transform the image into a professional headshot. The person should be {pose} with a \"{}\" expression. They should be {}. Please maintain the original hairstyle from the photo. The background should be a clean, neutral, out-of-focus studio background (like light gray, beige, or white).",
                options.headshot_expression, variant.base
            )
        }
        TemplateKey::EightiesMall => format!(
            "{base} Transform the image into a photo from a single 1980s mall photoshoot. The overall style for the entire photoshoot is: \"{}\". For this specific photo, the person should be in {}. The person's hair and clothing should be 80s style and be consistent across all photos in this set. The background and lighting must also match the overall style for every photo.",
            options.album_style.as_deref().unwrap_or_default(),
            variant.base
        ),
        TemplateKey::StyleLookbook => format!(
            "{base} Transform the image into a high-fashion lookbook photo. The overall fashion style is \"{}\". For this photo, create a unique, stylish outfit that fits the style, and place the person in {} in a suitable, fashionable setting. Hair and makeup should complement the style. Each photo in the lookbook should feature a different outfit.",
            options
                .lookbook_style
                .as_ref()
                .map(|style| style.as_str().trim())
                .unwrap_or_default(),
            variant.base
        ),
        TemplateKey::Figurines => format!(
            "{base} Transform the person into a miniature figurine based on the following description, placing it in a realistic environment: {}. The final image should look like a real photograph of a physical object.",
            variant.base
        ),
        TemplateKey::MizoAttire => format!(
            "{base} Clothe the person in a traditional Mizo garment, specifically {}. The background should be a natural, scenic view of the Mizo hills. The final image should be a respectful and authentic portrait.",
            variant.base
        ),
        TemplateKey::PhotoRestoration => format!(
            "You are a professional photo restoration expert. {base} Based on the user's request, perform the following task on the provided photo: \"{}\". Do not add new elements or drastically alter the original composition. The goal is to restore and enhance, not to create something new.",
            variant.base
        ),
        TemplateKey::PixarStyle => format!(
            "{base} Transform the person into an expressive 3D character in the iconic style of Pixar animation. The character should have exaggerated but appealing features, soft lighting, and detailed textures. Place this character in the following scene: {}",
            variant.base
        ),
        TemplateKey::Celebrity => celebrity_instruction(variant, options),
        TemplateKey::KeychainCreator => {
            let label = options.keychain_text().unwrap_or(DEFAULT_KEYCHAIN_LABEL);
            format!(
                "{base} Create a 9:16 ultra-realistic product photograph with soft studio lighting and glossy highlights. The photo should feature a realistic action figure keychain of the person from the uploaded image, designed with lifelike details and natural proportions. The figure must have a soft, cheerful expression, a realistic face sculpt, and a premium collectible look. The keychain strap should be a bright color that complements the character's clothing and feature extra bold white text that reads \"{label}\". A realistic human hand should be holding the keychain ring, with fingers gently pinching it, captured sharply in focus. The background must be softly blurred with inside shop of the key chain interior lighting, cinematic bokeh, and a professional product showcase aesthetic."
            )
        }
        TemplateKey::Unknown(_) => format!(
            "Create an image based on the reference photo and this prompt: {}",
            variant.base
        ),
    }
}

fn hair_instruction(variant: &PromptVariant, options: &GenerationOptions) -> String {
    let mut instruction = format!(
        "{LIKENESS_PREAMBLE} Style the person's hair to be a perfect example of {}. If the person's hair already has this style, enhance and perfect it. Do not alter the person's clothing or the background.",
        variant.base
    );
    if TEXTURE_PRESERVING_HAIRSTYLES.contains(&variant.id.as_str()) {
        instruction.push_str(" Maintain the person's original hair texture (e.g., straight, wavy, curly).");
    }
    match options.hair_colors.as_slice() {
        [color] => instruction.push_str(&format!(" The hair color should be {color}.")),
        [first, second] => instruction.push_str(&format!(
            " The hair should be a mix of two colors: {first} and {second}."
        )),
        _ => {}
    }
    instruction
}

fn celebrity_instruction(variant: &PromptVariant, options: &GenerationOptions) -> String {
    let Some(name) = options.celebrity_name() else {
        return LIKENESS_PREAMBLE.to_string();
    };
    let scene = variant.base.replacen(CELEBRITY_TOKEN, name, 1);
    if IN_PHOTO_CELEBRITY_VARIANTS.contains(&variant.id.as_str()) {
        format!(
            "{LIKENESS_PREAMBLE} Modify the original photo by following this instruction: \"{scene}\". The celebrity should look realistic and be integrated seamlessly. It is crucial to not change the person from the original photo, their pose, or their clothing."
        )
    } else {
        format!(
            "{LIKENESS_PREAMBLE} Place the person from the photo into the following scene: {scene}. The celebrity should look realistic and be interacting naturally with the person from the photo. Match the lighting and style of a real photograph."
        )
    }
}

/// Text prompt for the one-off shared style descriptor.
pub fn describe_request(brief: &str) -> String {
    format!(
        "Generate a short, creative, and detailed style description for a photoshoot based on this theme: \"{}\". The description should be a single sentence and sound cool.",
        brief
    )
}
