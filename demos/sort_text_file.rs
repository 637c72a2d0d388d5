use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Error;
use line_extsort::sort::{sort_in_place, SortInPlace};
use rand::seq::SliceRandom;
use simple_logger::SimpleLogger;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn create_random_records(path: &Path, count: usize) -> Result<(), Error> {
    let mut ids: Vec<usize> = (0..count).collect();
    ids.shuffle(&mut rand::thread_rng());
    let mut writer = BufWriter::new(File::create(path)?);
    for id in ids {
        writeln!(writer, "name-{}\t{}\t{}", id % 97, id, id % 13)?;
    }
    writer.flush()?;
    Ok(())
}

fn sort_lines(path: &Path, tmp: &Path) -> Result<(), Error> {
    // the complete line is the key
    sort_in_place(path, |line: &str| Ok::<String, Error>(line.to_string()), 1_000_000, Some(tmp.to_path_buf()))?;
    Ok(())
}

fn sort_records(path: &Path, tmp: &Path) -> Result<(), Error> {
    // third field ascending, then second field as an integer
    let key_fn = |line: &str| -> Result<(u32, i64), Error> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            anyhow::bail!("expected 3 fields, found {}", fields.len());
        }
        Ok((fields[2].trim().parse()?, fields[1].trim().parse()?))
    };
    let mut text_file = SortInPlace::new(path.to_path_buf(), key_fn);
    text_file.with_block_size_bytes(1_000_000);
    text_file.with_tmp_dir(tmp.to_path_buf());
    let summary = text_file.sort()?;
    log::info!("Sorted {} records using {} spills", summary.records(), summary.spills());
    assert!(text_file.check()?);
    Ok(())
}

// cargo run -r --example sort_text_file
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init()?;
    let tmp = PathBuf::from("./target/sort-text-file-tmp");
    fs::create_dir_all(&tmp)?;
    let lines_path = PathBuf::from("./target/lines-100000.dat");
    let records_path = PathBuf::from("./target/records-100000.dat");

    create_random_records(&lines_path, 100_000)?;
    sort_lines(&lines_path, &tmp)?;

    create_random_records(&records_path, 100_000)?;
    sort_records(&records_path, &tmp)?;

    Ok(())
}
