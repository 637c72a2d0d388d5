use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand::rngs::StdRng;
use simple_logger::SimpleLogger;
use tempfile::TempDir;

/// A scratch area holding the file to sort in `data` and spill files in `tmp`
pub struct Workspace {
    _root: TempDir,
    data: PathBuf,
    tmp: PathBuf,
}

impl Workspace {
    pub fn data(&self) -> &PathBuf {
        &self.data
    }

    pub fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub fn input(&self) -> PathBuf {
        self.data.join("input.dat")
    }
}

pub fn setup() -> Workspace {
    // only the first test to get here installs the logger
    let _ = SimpleLogger::new().with_level(log::LevelFilter::Warn).init();
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let tmp = root.path().join("tmp");
    fs::create_dir_all(&data)
        .unwrap_or_else(|_| panic!("Failed to create data directory: {:?}", data));
    fs::create_dir_all(&tmp)
        .unwrap_or_else(|_| panic!("Failed to create tmp directory: {:?}", tmp));
    Workspace {
        _root: root,
        data,
        tmp,
    }
}

#[allow(dead_code)]
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn shuffled(mut lines: Vec<String>, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    lines.shuffle(&mut rng);
    lines
}

#[allow(dead_code)]
pub fn dir_entries(path: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

#[allow(dead_code)]
pub fn integer_key(line: &str) -> Result<u64, anyhow::Error> {
    let field = line.split('\t').next().unwrap_or_default();
    Ok(field.trim().parse::<u64>()?)
}
