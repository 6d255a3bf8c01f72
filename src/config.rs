/// `config` module: loads the static YAML configuration of the SLI generator
/// and injects the values that come from the environment.
///
/// # Responsibilities
/// - Parse the YAML file into typed settings (template, converter, page, storage markers)
/// - Resolve the customer-care email: `CUSTOMER_CARE_EMAIL` overrides the file value
/// - Fall back to the built-in shipping rules unless the file provides its own
///
/// # Errors
/// All errors use `anyhow::Error` and name the failing piece (file, YAML, env var, converter).
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::compose::ShippingRules;
use crate::contract::PdfOptions;

pub const CUSTOMER_CARE_EMAIL_ENV: &str = "CUSTOMER_CARE_EMAIL";
pub const DEFAULT_TEMPLATE_PATH: &str = "templates/uti_sli.html";
/// Storage target marker downstream delivery config keys off. Do not change.
pub const DEFAULT_FILE_TARGET: &str = "BULKING_HERMES_UTISLI";
pub const DEFAULT_REF_COLLECTION: &str = "bulking.hermes.utisli";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    /// In-process layout with printpdf.
    PrintPdf,
    /// External `wkhtmltopdf` binary.
    Wkhtmltopdf,
}

impl ConverterKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "printpdf" | "PrintPdf" | "print_pdf" => Some(ConverterKind::PrintPdf),
            "wkhtmltopdf" | "Wkhtmltopdf" => Some(ConverterKind::Wkhtmltopdf),
            _ => None,
        }
    }
}

/// Fully resolved settings for one generator instance.
#[derive(Debug, Clone)]
pub struct SliConfig {
    pub template_path: PathBuf,
    pub customer_care_email: String,
    pub file_target: String,
    pub ref_collection: String,
    pub converter: ConverterKind,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub page: PdfOptions,
    pub output_dir: PathBuf,
    pub rules: ShippingRules,
}

impl SliConfig {
    pub fn trace_loaded(&self) {
        info!(
            template = %self.template_path.display(),
            converter = ?self.converter,
            output_dir = %self.output_dir.display(),
            consignee_countries = self.rules.consignees.len(),
            "Loaded SLI config"
        );
        debug!(?self, "SLI config loaded (full debug)");
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    template_path: Option<PathBuf>,
    #[serde(default)]
    customer_care_email: Option<String>,
    #[serde(default)]
    file_target: Option<String>,
    #[serde(default)]
    ref_collection: Option<String>,
    #[serde(default)]
    converter: Option<String>,
    #[serde(default)]
    wkhtmltopdf_path: Option<PathBuf>,
    #[serde(default)]
    page: PdfOptions,
    output_dir: PathBuf,
    #[serde(default)]
    rules: Option<ShippingRules>,
}

/// Loads the YAML config file and injects the customer-care email from the env.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let customer_care_email = match std::env::var(CUSTOMER_CARE_EMAIL_ENV) {
        Ok(email) if !email.trim().is_empty() => {
            info!("{CUSTOMER_CARE_EMAIL_ENV} found in env");
            email
        }
        _ => match raw.customer_care_email {
            Some(email) if !email.trim().is_empty() => email,
            _ => {
                error!("Customer-care email neither in env nor in config");
                anyhow::bail!(
                    "{CUSTOMER_CARE_EMAIL_ENV} environment variable not set and customer_care_email missing in config"
                );
            }
        },
    };

    let converter = match raw.converter.as_deref() {
        None => ConverterKind::PrintPdf,
        Some(kind) => match ConverterKind::parse(kind) {
            Some(kind) => kind,
            None => {
                error!(kind = %kind, "Unsupported converter in config");
                anyhow::bail!("Unsupported converter: {}", kind);
            }
        },
    };

    let config = SliConfig {
        template_path: raw
            .template_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
        customer_care_email,
        file_target: raw
            .file_target
            .unwrap_or_else(|| DEFAULT_FILE_TARGET.to_string()),
        ref_collection: raw
            .ref_collection
            .unwrap_or_else(|| DEFAULT_REF_COLLECTION.to_string()),
        converter,
        wkhtmltopdf_path: raw.wkhtmltopdf_path,
        page: raw.page,
        output_dir: raw.output_dir,
        rules: raw.rules.unwrap_or_default(),
    };
    config.trace_loaded();
    Ok(config)
}
