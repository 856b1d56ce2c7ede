use anyhow::Context;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub fn write_csv<I, R, W>(records: I, writer: W) -> csv::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Open a file for reading, or stdin for "-"
pub fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Write output all-or-nothing: into `<path>.tmp`, then renamed over `path`.
/// "-" writes to stdout.
pub fn write_output<F>(path: &Path, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut dyn Write) -> anyhow::Result<()>,
{
    if is_stdio(path) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        write(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let result = File::create(temp_path)
        .with_context(|| format!("creating {}", temp_path.display()))
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(())
        });
    if let Err(err) = result {
        let _ = fs::remove_file(temp_path);
        return Err(err);
    }

    fs::rename(temp_path, path)
        .with_context(|| format!("renaming {} to {}", temp_path.display(), path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
