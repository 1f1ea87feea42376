//! CLI parser
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    BoothConfig, DEFAULT_API_BASE, DEFAULT_DAILY_LIMIT, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL,
};
use crate::models::{AspectRatio, DEFAULT_EXPRESSION, GenerationOptions, HeadshotPose, LookbookStyle};

#[derive(Parser, Debug)]
#[clap(name = "themebooth", version)]
/// Themed photo booth backed by a generative image model.
pub struct CliOptions {
    #[clap(long, global = true, env = "THEMEBOOTH_DEBUG")]
    /// Enable debug logging. Env: THEMEBOOTH_DEBUG
    pub debug: bool,

    #[clap(long, global = true, default_value_t = DEFAULT_DAILY_LIMIT, env = "THEMEBOOTH_DAILY_LIMIT")]
    /// Batches allowed per 24 hour window.
    /// Env: THEMEBOOTH_DAILY_LIMIT
    pub daily_limit: u32,

    #[clap(
        long,
        global = true,
        default_value = ".themebooth-quota.json",
        env = "THEMEBOOTH_QUOTA_FILE"
    )]
    /// Where the daily counter is kept when Redis is not configured.
    /// Env: THEMEBOOTH_QUOTA_FILE
    pub quota_file: PathBuf,

    #[clap(long, global = true, env = "THEMEBOOTH_REDIS_URL")]
    /// Keep the daily counter in Redis instead, eg `redis://127.0.0.1:6379`.
    /// Env: THEMEBOOTH_REDIS_URL
    pub redis_url: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available themes and their variants.
    Themes,
    /// Show how many batches are left today.
    Quota,
    /// Run one themed batch against a photo.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[clap(long, short)]
    /// Photo to transform.
    pub photo: PathBuf,

    #[clap(long, short)]
    /// Theme key, eg `decades` or `hairStyler`. See `themebooth themes`.
    pub theme: String,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Env: GEMINI_API_KEY
    pub api_key: String,

    #[clap(long, default_value = DEFAULT_API_BASE, env = "THEMEBOOTH_API_BASE")]
    /// Env: THEMEBOOTH_API_BASE
    pub api_base: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "THEMEBOOTH_IMAGE_MODEL")]
    /// Env: THEMEBOOTH_IMAGE_MODEL
    pub image_model: String,

    #[clap(long, default_value = DEFAULT_TEXT_MODEL, env = "THEMEBOOTH_TEXT_MODEL")]
    /// Env: THEMEBOOTH_TEXT_MODEL
    pub text_model: String,

    #[clap(long, env = "THEMEBOOTH_FONT")]
    /// TTF/OTF for the watermark and frame text; overrides the bundled face.
    /// Env: THEMEBOOTH_FONT
    pub font: Option<PathBuf>,

    #[clap(long, short, default_value = "out", env = "THEMEBOOTH_OUT_DIR")]
    /// Env: THEMEBOOTH_OUT_DIR
    pub out_dir: PathBuf,

    #[clap(long, default_value = DEFAULT_EXPRESSION)]
    /// Headshot expression.
    pub expression: String,

    #[clap(long, default_value = "forward")]
    /// Headshot pose: `forward` or `angled`.
    pub pose: HeadshotPose,

    #[clap(long = "hairstyle")]
    /// Hairstyle variant to include. Repeatable.
    pub hairstyles: Vec<String>,

    #[clap(long)]
    /// Free-text hairstyle appended to the selection.
    pub custom_hairstyle: Option<String>,

    #[clap(long = "hair-color")]
    /// Hair colour, at most two. Repeatable.
    pub hair_colors: Vec<String>,

    #[clap(long)]
    /// Preset lookbook style, eg `Streetwear`.
    pub style: Option<String>,

    #[clap(long)]
    /// Free-text lookbook style; wins over `--style`.
    pub custom_style: Option<String>,

    #[clap(long)]
    pub celebrity: Option<String>,

    #[clap(long)]
    /// Label printed on the keychain strap.
    pub keychain_text: Option<String>,

    #[clap(long)]
    /// Regenerate each failed slot once after the batch.
    pub retry_failed: bool,

    #[clap(long)]
    /// Save framed cards at this ratio (`1:1` or `9:16`) instead of the
    /// plain watermarked images.
    pub frame: Option<AspectRatio>,

    #[clap(long)]
    /// Also write every success into one zip album.
    pub album: bool,
}

impl GenerateArgs {
    pub fn options(&self) -> GenerationOptions {
        let lookbook_style = match (&self.custom_style, &self.style) {
            (Some(custom), _) => Some(LookbookStyle::Custom(custom.clone())),
            (None, Some(preset)) => Some(LookbookStyle::Preset(preset.clone())),
            (None, None) => None,
        };
        GenerationOptions {
            headshot_expression: self.expression.clone(),
            headshot_pose: self.pose,
            album_style: None,
            hair_colors: self.hair_colors.clone(),
            selected_hairstyles: self.hairstyles.clone(),
            custom_hairstyle: self.custom_hairstyle.clone(),
            lookbook_style,
            celebrity_name: self.celebrity.clone(),
            keychain_text: self.keychain_text.clone(),
        }
    }
}

impl CliOptions {
    pub fn config(&self) -> BoothConfig {
        let mut config = BoothConfig {
            daily_limit: self.daily_limit,
            quota_file: self.quota_file.clone(),
            redis_url: self.redis_url.clone(),
            ..Default::default()
        };
        if let Command::Generate(args) = &self.command {
            config.api_key = args.api_key.clone();
            config.api_base = args.api_base.clone();
            config.image_model = args.image_model.clone();
            config.text_model = args.text_model.clone();
            config.font = args.font.clone();
            config.out_dir = args.out_dir.clone();
        }
        config
    }
}
