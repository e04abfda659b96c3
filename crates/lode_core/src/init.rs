use cap_std::{ambient_authority, fs_utf8::camino::Utf8PathBuf, fs_utf8::Dir};
use miette::{Context, IntoDiagnostic, Result};

pub const DATA_DIR_ENV: &str = "LODEBAR_DATA_DIR";

/// Lodebar data directory
/// We will read a path from env `LODEBAR_DATA_DIR` or create a folder at data_local_dir/lodebar, where data_local_dir is platform specific
/// Inside this directory, we store the config file, the persisted lodestone colors and logs.
pub fn get_lodebar_dir() -> Result<Dir> {
    let authoratah = ambient_authority();
    let ldir = if let Ok(env_dir) = std::env::var(DATA_DIR_ENV) {
        let path = Utf8PathBuf::from(env_dir.as_str());
        open_dir_at(path).wrap_err("failed to use LODEBAR_DATA_DIR")?
    } else {
        let dir = cap_directories::ProjectDirs::from("com.lodebar", "", "lodebar", authoratah)
            .ok_or(miette::miette!(
                "getting project dirs failed for some reason"
            ))?
            .data_local_dir()
            .into_diagnostic()
            .wrap_err("failed to get data local dir using capstd")?;
        Dir::from_cap_std(dir)
    };
    Ok(ldir)
}

/// creates the directory (and parents) if needed and opens it.
pub fn open_dir_at(path: Utf8PathBuf) -> Result<Dir> {
    let authoratah = ambient_authority();
    Dir::create_ambient_dir_all(&path, authoratah)
        .into_diagnostic()
        .wrap_err(path.clone())
        .wrap_err("failed to create lodebar directory")?;
    Dir::open_ambient_dir(&path, authoratah)
        .into_diagnostic()
        .wrap_err(path)
        .wrap_err("failed to open lodebar data dir")
}
