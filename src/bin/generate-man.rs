// Writes immocrm man pages (one per subcommand) into the given directory

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_mangen::Man;
use immocrm::cli::Cli;
use std::path::{Path, PathBuf};

fn write_page(cmd: &clap::Command, dir: &Path, name: &str) -> Result<()> {
    let mut buffer = Vec::new();
    Man::new(cmd.clone()).render(&mut buffer)?;
    let path = dir.join(format!("{}.1", name));
    std::fs::write(&path, buffer).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("man"));
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let cmd = Cli::command();
    write_page(&cmd, &dir, "immocrm")?;
    for sub in cmd.get_subcommands() {
        let name = format!("immocrm-{}", sub.get_name());
        write_page(sub, &dir, &name)?;
    }
    Ok(())
}
