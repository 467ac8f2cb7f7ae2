use std::env;
use std::path::{Path, PathBuf};

/// エンジンパスを上書きする環境変数。
pub const ENGINE_ENV: &str = "CHESSY_ENGINE";

#[cfg(windows)]
const ENGINE_NAMES: [&str; 2] = ["stockfish-windows-x86-64-avx2.exe", "stockfish.exe"];
#[cfg(not(windows))]
const ENGINE_NAMES: [&str; 1] = ["stockfish"];

#[cfg(not(windows))]
const SYSTEM_LOCATIONS: [&str; 3] =
    ["/usr/bin/stockfish", "/usr/local/bin/stockfish", "/usr/games/stockfish"];
#[cfg(windows)]
const SYSTEM_LOCATIONS: [&str; 2] =
    [r"C:\Program Files\Stockfish\stockfish.exe", r"C:\Stockfish\stockfish.exe"];

/// Locate the engine binary.
///
/// Order: `explicit` → `$CHESSY_ENGINE` → `stockfish/` next to the working
/// directory → system locations → `PATH`.
pub fn find_engine(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        log::warn!("engine path {} does not exist, searching defaults", path.display());
    }
    if let Some(value) = env::var_os(ENGINE_ENV) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Some(path);
        }
        log::warn!("{ENGINE_ENV}={} does not exist", path.display());
    }
    if let Some(found) = find_engine_in_dir(Path::new("stockfish")) {
        return Some(found);
    }
    if let Some(found) = SYSTEM_LOCATIONS.iter().map(PathBuf::from).find(|p| p.is_file()) {
        return Some(found);
    }
    env::var_os("PATH").and_then(|paths| env::split_paths(&paths).find_map(|dir| find_engine_in_dir(&dir)))
}

/// エンジンバイナリを指定ディレクトリから探す。
pub fn find_engine_in_dir(dir: &Path) -> Option<PathBuf> {
    ENGINE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
