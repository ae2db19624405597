use crate::models::menu::Permissions;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub source: SourceConfig,
}

/// Output format requested from the thumbnail renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThumbnailType {
    Png,
    Jpg,
    Gif,
}

impl ThumbnailType {
    pub fn as_str(self) -> &'static str {
        match self {
            ThumbnailType::Png => "png",
            ThumbnailType::Jpg => "jpg",
            ThumbnailType::Gif => "gif",
        }
    }
}

impl FromStr for ThumbnailType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ThumbnailType::Png),
            "jpg" | "jpeg" => Ok(ThumbnailType::Jpg),
            "gif" => Ok(ThumbnailType::Gif),
            other => anyhow::bail!("unsupported thumbnail type `{}`", other),
        }
    }
}

/// Access credentials for the object store. Never printed.
#[derive(Clone, Default)]
pub struct Credentials {
    pub key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &if self.key.is_empty() { "" } else { "<redacted>" })
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Extension lists that together form the upload allow-list.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub files: Vec<String>,
    pub images: Vec<String>,
    pub media: Vec<String>,
    pub flash: Vec<String>,
    pub max_size_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            files: split_list(DEFAULT_UPLOAD_FILES),
            images: split_list(DEFAULT_UPLOAD_IMAGES),
            media: split_list(DEFAULT_UPLOAD_MEDIA),
            flash: split_list(DEFAULT_UPLOAD_FLASH),
            max_size_bytes: 1_048_576,
        }
    }
}

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Settings of one object-store media source. Read-only at request time.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub source_id: u32,
    pub bucket: String,
    /// Public base URL objects are served from.
    pub base_url: String,
    pub credentials: Credentials,
    pub image_extensions: Vec<String>,
    pub thumbnail_type: ThumbnailType,
    pub thumbnail_quality: u8,
    /// Basenames hidden from listings.
    pub skip_files: Vec<String>,
    /// When non-empty, the grid view only shows these extensions.
    pub allowed_file_types: Vec<String>,
    pub upload: UploadPolicy,
    /// Endpoint of the external thumbnail renderer.
    pub thumbnail_endpoint: String,
    pub manager_url: String,
    pub context_key: String,
    pub use_multibyte: bool,
    pub probe_images: bool,
    pub image_size: Dimensions,
    pub thumb_size: Dimensions,
    /// Permission set assumed when a request does not carry one.
    pub permissions: Permissions,
}

pub const DEFAULT_IMAGE_EXTENSIONS: &str = "jpg,jpeg,png,gif";
pub const DEFAULT_SKIP_FILES: &str = ".svn,.git,_notes,nbproject,.idea,.DS_Store";
const DEFAULT_UPLOAD_FILES: &str = "txt,html,htm,xml,js,css,zip,gz,rar,z,tgz,tar,htaccess,mp3,mp4,aac,wav,au,wmv,avi,mpg,mpeg,pdf,doc,docx,xls,xlsx,ppt,pptx,jpg,jpeg,png,tiff,svg,svgz,gif,psd,ico,bmp,odt,ods,odp,odb,odg,odf";
const DEFAULT_UPLOAD_IMAGES: &str = "jpg,jpeg,png,gif,psd,ico,bmp,svg,tiff,tif";
const DEFAULT_UPLOAD_MEDIA: &str = "mp3,wav,au,wmv,avi,mpg,mpeg";
const DEFAULT_UPLOAD_FLASH: &str = "swf,fla";

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_id: 1,
            bucket: "media".into(),
            base_url: "http://127.0.0.1:3000/objects/".into(),
            credentials: Credentials::default(),
            image_extensions: split_list(DEFAULT_IMAGE_EXTENSIONS),
            thumbnail_type: ThumbnailType::Png,
            thumbnail_quality: 90,
            skip_files: split_list(DEFAULT_SKIP_FILES),
            allowed_file_types: Vec::new(),
            upload: UploadPolicy::default(),
            thumbnail_endpoint: "/connectors/system/phpthumb.php".into(),
            manager_url: "/manager/".into(),
            context_key: "mgr".into(),
            use_multibyte: false,
            probe_images: true,
            image_size: Dimensions::new(400, 300),
            thumb_size: Dimensions::new(80, 60),
            permissions: Permissions::all(),
        }
    }
}

/// Split a comma list into trimmed, non-empty, deduplicated items.
pub fn split_list(list: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Object-store media source connector")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_SOURCE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_SOURCE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides MEDIA_SOURCE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MEDIA_SOURCE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket backing the media source (overrides MEDIA_SOURCE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Public base URL of the bucket (overrides MEDIA_SOURCE_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Numeric id of this media source (overrides MEDIA_SOURCE_ID)
    #[arg(long)]
    pub source_id: Option<u32>,

    /// Comma list of image extensions (overrides MEDIA_SOURCE_IMAGE_EXTENSIONS)
    #[arg(long)]
    pub image_extensions: Option<String>,

    /// Thumbnail output format (overrides MEDIA_SOURCE_THUMBNAIL_TYPE)
    #[arg(long, value_enum)]
    pub thumbnail_type: Option<ThumbnailType>,

    /// Thumbnail quality 1-100 (overrides MEDIA_SOURCE_THUMBNAIL_QUALITY)
    #[arg(long)]
    pub thumbnail_quality: Option<u8>,

    /// Comma list of names hidden from listings (overrides MEDIA_SOURCE_SKIP_FILES)
    #[arg(long)]
    pub skip_files: Option<String>,

    /// Maximum upload size in bytes (overrides MEDIA_SOURCE_UPLOAD_MAXSIZE)
    #[arg(long)]
    pub upload_maxsize: Option<u64>,

    /// Do not fetch images to read their dimensions
    #[arg(long)]
    pub no_probe: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("MEDIA_SOURCE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed("MEDIA_SOURCE_PORT")?.unwrap_or(3000);
        let env_storage =
            env::var("MEDIA_SOURCE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("MEDIA_SOURCE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/media_source.db".into());

        let defaults = SourceConfig::default();
        let env_thumbnail_type = match env::var("MEDIA_SOURCE_THUMBNAIL_TYPE") {
            Ok(value) => Some(value.parse::<ThumbnailType>()?),
            Err(_) => None,
        };

        let mut upload = UploadPolicy::default();
        if let Ok(list) = env::var("MEDIA_SOURCE_UPLOAD_FILES") {
            upload.files = split_list(&list);
        }
        if let Ok(list) = env::var("MEDIA_SOURCE_UPLOAD_IMAGES") {
            upload.images = split_list(&list);
        }
        if let Ok(list) = env::var("MEDIA_SOURCE_UPLOAD_MEDIA") {
            upload.media = split_list(&list);
        }
        if let Ok(list) = env::var("MEDIA_SOURCE_UPLOAD_FLASH") {
            upload.flash = split_list(&list);
        }
        upload.max_size_bytes = args
            .upload_maxsize
            .or(env_parsed("MEDIA_SOURCE_UPLOAD_MAXSIZE")?)
            .unwrap_or(upload.max_size_bytes);

        let thumbnail_quality = args
            .thumbnail_quality
            .or(env_parsed("MEDIA_SOURCE_THUMBNAIL_QUALITY")?)
            .unwrap_or(defaults.thumbnail_quality);
        if !(1..=100).contains(&thumbnail_quality) {
            anyhow::bail!("thumbnail quality must be within 1..=100, got {thumbnail_quality}");
        }

        // --- Merge ---
        let source = SourceConfig {
            source_id: args
                .source_id
                .or(env_parsed("MEDIA_SOURCE_ID")?)
                .unwrap_or(defaults.source_id),
            bucket: args
                .bucket
                .or_else(|| env::var("MEDIA_SOURCE_BUCKET").ok())
                .unwrap_or(defaults.bucket),
            base_url: args
                .base_url
                .or_else(|| env::var("MEDIA_SOURCE_BASE_URL").ok())
                .unwrap_or(defaults.base_url),
            credentials: Credentials {
                key: env::var("MEDIA_SOURCE_KEY").unwrap_or_default(),
                secret_key: env::var("MEDIA_SOURCE_SECRET_KEY").unwrap_or_default(),
            },
            image_extensions: args
                .image_extensions
                .or_else(|| env::var("MEDIA_SOURCE_IMAGE_EXTENSIONS").ok())
                .map(|list| split_list(&list))
                .unwrap_or(defaults.image_extensions),
            thumbnail_type: args
                .thumbnail_type
                .or(env_thumbnail_type)
                .unwrap_or(defaults.thumbnail_type),
            thumbnail_quality,
            skip_files: args
                .skip_files
                .or_else(|| env::var("MEDIA_SOURCE_SKIP_FILES").ok())
                .map(|list| split_list(&list))
                .unwrap_or(defaults.skip_files),
            allowed_file_types: env::var("MEDIA_SOURCE_ALLOWED_FILE_TYPES")
                .map(|list| split_list(&list.to_lowercase()))
                .unwrap_or_default(),
            upload,
            thumbnail_endpoint: env::var("MEDIA_SOURCE_THUMBNAIL_ENDPOINT")
                .unwrap_or(defaults.thumbnail_endpoint),
            manager_url: env::var("MEDIA_SOURCE_MANAGER_URL").unwrap_or(defaults.manager_url),
            context_key: env::var("MEDIA_SOURCE_CONTEXT_KEY").unwrap_or(defaults.context_key),
            use_multibyte: env_parsed("MEDIA_SOURCE_USE_MULTIBYTE")?
                .unwrap_or(defaults.use_multibyte),
            probe_images: !args.no_probe,
            image_size: defaults.image_size,
            thumb_size: defaults.thumb_size,
            permissions: env::var("MEDIA_SOURCE_PERMISSIONS")
                .map(|list| Permissions::from_list(&list))
                .unwrap_or(defaults.permissions),
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            source,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an optional environment variable.
fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
