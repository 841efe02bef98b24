//! `mmagic`: print the MIME type of files, like `file --mime-type`.

use std::io::{self, BufRead, Seek, Write};
use std::path::{Path, PathBuf};
use std::process;
use clap::{App, Arg};
use log::{debug, warn};
use magic_mime::Magic;
use scoped_threadpool::Pool;
use tabwriter::TabWriter;
use walkdir::WalkDir;

/// What one input resolved to.
enum Answer {
    Label(String),
    Unknown,
    Failed(String),
}

/// Expand directories when walking recursively; leave everything else as given.
fn collect_files(inputs: Vec<PathBuf>, recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !recursive || !input.is_dir() {
            files.push(input);
            continue;
        }
        for entry in WalkDir::new(&input).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("skipping part of {}: {}", input.display(), e),
            }
        }
    }
    files
}

fn identify_chunk<R: BufRead + Seek>(magic: &mut Magic<R>, files: &[PathBuf]) -> Vec<Answer> {
    files.iter()
        .map(|path| match magic.identify_path(path) {
            Ok(Some(label)) => Answer::Label(label),
            Ok(None) => Answer::Unknown,
            Err(e) => Answer::Failed(e.to_string()),
        })
        .collect()
}

/// Each worker gets its own cursor over the rules.
fn identify_worker(magic_file: Option<&Path>, files: &[PathBuf]) -> Vec<Answer> {
    let opened = match magic_file {
        Some(path) => Magic::open(path).map(|mut magic| identify_chunk(&mut magic, files)),
        None => Magic::builtin().map(|mut magic| identify_chunk(&mut magic, files)),
    };
    match opened {
        Ok(answers) => answers,
        Err(e) => files.iter().map(|_| Answer::Failed(e.to_string())).collect(),
    }
}

/// Write one `path:<sep>label` line per file. True if any file failed.
fn print_answers<W: Write>(out: &mut W, sep: &str, files: &[PathBuf], answers: &[Answer]) -> io::Result<bool> {
    let mut failed = false;
    for (path, answer) in files.iter().zip(answers) {
        match answer {
            Answer::Label(label) => writeln!(out, "{}:{}{}", path.display(), sep, label)?,
            Answer::Unknown => writeln!(out, "{}:{}data", path.display(), sep)?,
            Answer::Failed(e) => {
                failed = true;
                writeln!(out, "{}:{}cannot open ({})", path.display(), sep, e)?;
            }
        }
    }
    out.flush()?;
    Ok(failed)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = App::new("mmagic")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Determines the MIME type of files from their contents")
        .arg(Arg::with_name("file")
            .help("List of files to get information about")
            .required(true)
            .multiple(true)
            .index(1))
        .arg(Arg::with_name("recursive")
            .short("r")
            .long("recursive")
            .help("Descend into directories"))
        .arg(Arg::with_name("magic")
            .short("m")
            .long("magic")
            .takes_value(true)
            .value_name("FILE")
            .help("Use FILE instead of the built-in rules"))
        .arg(Arg::with_name("jobs")
            .short("j")
            .long("jobs")
            .takes_value(true)
            .value_name("N")
            .help("Number of worker threads (default: one per CPU)"))
        .arg(Arg::with_name("ugly")
            .long("ugly")
            .help("Print results without aligning columns"))
        .get_matches();

    let inputs: Vec<PathBuf> = args.values_of_os("file")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    let files = collect_files(inputs, args.is_present("recursive"));

    let magic_file = args.value_of_os("magic").map(PathBuf::from);
    if let Some(ref path) = magic_file {
        // Fail once up front instead of once per file
        if let Err(e) = Magic::open(path) {
            eprintln!("mmagic: {}", e);
            process::exit(2);
        }
    }

    let jobs = match args.value_of("jobs") {
        Some(n) => match n.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("mmagic: invalid number of jobs: {}", n);
                process::exit(2);
            }
        },
        None => num_cpus::get() as u32,
    };

    // Split the work into one contiguous chunk per worker so output keeps input order
    let chunk_size = ((files.len() + jobs as usize - 1) / jobs as usize).max(1);
    let chunks: Vec<&[PathBuf]> = files.chunks(chunk_size).collect();
    let mut results: Vec<Vec<Answer>> = chunks.iter().map(|_| Vec::new()).collect();
    debug!("{} files in {} chunks on {} threads", files.len(), chunks.len(), jobs);

    let mut pool = Pool::new(jobs);
    pool.scoped(|scope| {
        for (chunk, result) in chunks.iter().zip(results.iter_mut()) {
            let magic_file = magic_file.as_deref();
            scope.execute(move || {
                *result = identify_worker(magic_file, chunk);
            });
        }
    });

    let answers: Vec<Answer> = results.into_iter().flatten().collect();
    let stdout = io::stdout();
    let printed = if args.is_present("ugly") {
        print_answers(&mut stdout.lock(), " ", &files, &answers)
    } else {
        print_answers(&mut TabWriter::new(stdout.lock()), "\t", &files, &answers)
    };

    match printed {
        Ok(false) => {}
        Ok(true) => process::exit(1),
        Err(e) => {
            eprintln!("mmagic: {}", e);
            process::exit(2);
        }
    }
}
