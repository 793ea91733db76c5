use fade_ink::draw;
use fade_ink::logging;
use fade_ink::settings::InkSettings;

const DEFAULT_SETTINGS_PATH: &str = "settings.json";

fn main() -> anyhow::Result<()> {
    let mut settings_path = DEFAULT_SETTINGS_PATH.to_string();
    let mut preview = !cfg!(windows);
    for arg in std::env::args().skip(1) {
        if arg == "--preview" {
            preview = true;
        } else {
            settings_path = arg;
        }
    }

    let mut settings = InkSettings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    if settings.sanitize() {
        tracing::warn!(path = %settings_path, "settings contained unusable values; clamped");
    }
    let config = settings.overlay_config();

    if preview {
        return draw::egui_host::run_preview(config);
    }

    let overlay = draw::mount_native(config)?;
    overlay.wait();
    Ok(())
}
