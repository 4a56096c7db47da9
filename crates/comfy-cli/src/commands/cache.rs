//! Cache command implementation

use std::path::Path;

use colored::Colorize;
use comfy_cache::NodeCache;

use crate::cli::CacheAction;
use crate::error::{CliError, Result};

/// Run a cache subcommand against the cache at `root`
pub fn run_cache(root: &Path, action: CacheAction) -> Result<()> {
    let cache = NodeCache::new(root);
    match action {
        CacheAction::List => list(&cache),
        CacheAction::Stats => stats(&cache),
        CacheAction::Clear { name, force } => clear(&cache, name.as_deref(), force),
        CacheAction::Verify => verify(&cache),
    }
}

fn list(cache: &NodeCache) -> Result<()> {
    let entries = cache.list_cached_nodes()?;
    if entries.is_empty() {
        println!("{} ({})", "Cache is empty".dimmed(), cache.root().display());
        return Ok(());
    }
    println!("{}", "Cached custom nodes".bold());
    println!();
    for entry in &entries {
        let version = entry.git_ref.as_deref().unwrap_or("-");
        println!(
            "  {:<32} {:<8} {:<12} {:>10} {:>4}x  {}",
            entry.name.green(),
            entry.install_method.to_string(),
            version,
            format_size(entry.size_bytes),
            entry.access_count,
            entry.cache_key.dimmed()
        );
    }
    Ok(())
}

fn stats(cache: &NodeCache) -> Result<()> {
    let stats = cache.stats()?;
    println!("{}", "Cache".bold());
    println!("  {}:     {}", "Root".dimmed(), stats.root.display());
    println!("  {}:    {}", "Nodes".dimmed(), stats.total_nodes);
    println!("  {}:     {}", "Size".dimmed(), format_size(stats.total_size_bytes));
    println!("  {}: {}", "Accesses".dimmed(), stats.total_accesses);
    for (method, count) in &stats.by_method {
        println!("  {:<9} {}", format!("{method}:").dimmed(), count);
    }
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("  {}:   {}", "Oldest".dimmed(), oldest.format("%Y-%m-%d %H:%M"));
        println!("  {}:   {}", "Newest".dimmed(), newest.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn clear(cache: &NodeCache, name: Option<&str>, force: bool) -> Result<()> {
    if name.is_none() && !force {
        return Err(CliError::user(
            "refusing to clear the entire cache without --force",
        ));
    }
    let removed = cache.clear_cache(name)?;
    match name {
        Some(name) if removed == 0 => {
            println!("{} no cached entries for '{}'", "warning:".yellow().bold(), name)
        }
        Some(name) => println!("{} {} entr{} for '{}'", "Removed".green(), removed, plural_y(removed), name),
        None => println!("{} {} entr{}", "Removed".green(), removed, plural_y(removed)),
    }
    Ok(())
}

fn verify(cache: &NodeCache) -> Result<()> {
    let results = cache.verify_all()?;
    if results.is_empty() {
        println!("{}", "Cache is empty".dimmed());
        return Ok(());
    }
    let mut corrupt = 0;
    for (entry, ok) in &results {
        if *ok {
            println!("  {} {} {}", "ok".green(), entry.name, entry.cache_key.dimmed());
        } else {
            corrupt += 1;
            println!("  {} {} {}", "CORRUPT".red().bold(), entry.name, entry.cache_key.dimmed());
        }
    }
    if corrupt > 0 {
        return Err(CliError::user(format!(
            "{corrupt} of {} cache entries failed verification; run `comfy-env cache clear <name>` to drop them",
            results.len()
        )));
    }
    println!();
    println!("{} {} entries verified", "All".green().bold(), results.len());
    Ok(())
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
