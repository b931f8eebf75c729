use std::fs;

use anyhow::Context as _;
use directories::ProjectDirs;
use quire_storage::Storage;
use quire_ui::Ui;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dirs = ProjectDirs::from("dev", "quire", "quire").context("resolve project dirs")?;

    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;

    let db_path = data_dir.join("quire.db");
    let storage = Storage::open(&db_path)?;

    let mut ui = Ui::new(storage);
    ui.run()
}
