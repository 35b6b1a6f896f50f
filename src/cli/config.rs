use crate::config::generate::generate_starter_config;
use crate::config::load_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/gulpd/config.yml, fall back to /etc/gulpd/config.yml
    let config_path = dirs::home_dir()
        .map(|home| home.join(".config/gulpd/config.yml"))
        .filter(|path| path.parent().is_some_and(|parent| fs::create_dir_all(parent).is_ok()))
        .unwrap_or_else(|| {
            eprintln!("Warning: Could not create ~/.config/gulpd");
            eprintln!("Falling back to /etc/gulpd/config.yml");
            PathBuf::from("/etc/gulpd/config.yml")
        });

    if config_path.exists() {
        eprintln!("Error: Config file already exists at {}", config_path.display());
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());
    let config = load_config(&path)?;

    println!("Config is valid.");
    println!("  sources: {}", config.sources.len());
    for source in &config.sources {
        println!("    {} on {}", source.id, source.listen);
    }
    println!("  triggering: {}", if config.trigger.enabled { "enabled" } else { "disabled" });
    match &config.output.root {
        Some(root) => println!("  output: {}", root.display()),
        None => println!("  output: disabled"),
    }
    Ok(())
}
