//! Command implementations for the CLI tool.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use resfork::source::{ForwardSource, SeekableSource};
use resfork::{
    ByteSource, CompressedHeader, DecompressReader, ForkMode, OpenOptions, Resource, ResourceFile,
};

use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::filter::{ResourceFilter, parse_filters, select};
use crate::output::{
    FileInfo, Length, ResourceRow, create_formatter, describe, hexdump, raw_hexdump, translate_text,
};
use crate::{DataFormat, GroupBy, HeaderPart, OutputFormat};

/// Where resource files are read from.
pub struct Source {
    pub fork: ForkMode,
}

/// Configuration for the list command.
pub struct ListConfig<'a> {
    pub source: &'a Source,
    pub file: &'a Path,
    pub filters: &'a [String],
    pub technical: bool,
    pub decompress: bool,
    pub sort: bool,
    pub group: GroupBy,
    pub format: OutputFormat,
}

/// Configuration for the read command.
pub struct ReadConfig<'a> {
    pub source: &'a Source,
    pub file: &'a Path,
    pub filters: &'a [String],
    pub format: DataFormat,
    pub decompress: bool,
    pub sort: bool,
}

/// A resource file opened from a path or from stdin.
enum Opened {
    Path(ResourceFile<SeekableSource<BufReader<File>>>),
    Stdin(ResourceFile<ForwardSource<io::Stdin>>),
}

/// Runs `$body` with `$file` bound to whichever kind of file was opened.
macro_rules! with_resource_file {
    ($source:expr, $path:expr, |$file:ident| $body:expr) => {
        match open_resource_file($source, $path) {
            Ok(Opened::Path($file)) => $body,
            Ok(Opened::Stdin($file)) => $body,
            Err(code) => code,
        }
    };
}

/// Info command implementation
pub fn info(source: &Source, path: &Path, format: OutputFormat) -> ExitCode {
    with_resource_file!(source, path, |file| {
        let info = FileInfo {
            fork: file.fork().map(|f| f.as_str()),
            data_offset: file.data_offset(),
            data_length: file.data_length(),
            map_offset: file.map_offset(),
            map_length: file.map_length(),
            system_data: file.system_data().to_vec(),
            application_data: file.application_data().to_vec(),
            file_attributes: file.file_attributes(),
            type_list_offset: file.type_list_offset(),
            name_list_offset: file.name_list_offset(),
            type_count: file.type_count(),
            resource_count: file.resource_count(),
        };
        print!("{}", create_formatter(format).format_info(&info));
        ExitCode::Success
    })
}

/// List command implementation
pub fn list(config: &ListConfig<'_>) -> ExitCode {
    let filters = match parse_filters(config.filters) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    with_resource_file!(config.source, config.file, |file| {
        list_resources(&file, &filters, config)
    })
}

fn list_resources<S: ByteSource>(
    file: &ResourceFile<S>,
    filters: &[ResourceFilter],
    config: &ListConfig<'_>,
) -> ExitCode {
    let mut code = ExitCode::Success;
    let resources = selected(file, filters, config.sort, &mut code);

    let mut rows: Vec<ResourceRow> = resources
        .iter()
        .map(|resource| resource_row(resource, config.decompress, config.technical, &mut code))
        .collect();
    if config.group == GroupBy::Id {
        rows.sort_by_key(|row| row.id);
    }

    print!(
        "{}",
        create_formatter(config.format).format_list(&rows, config.group, config.technical)
    );

    code
}

/// Read command implementation
pub fn read(config: &ReadConfig<'_>) -> ExitCode {
    let filters = match parse_filters(config.filters) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    with_resource_file!(config.source, config.file, |file| {
        read_resources(&file, &filters, config)
    })
}

fn read_resources<S: ByteSource>(
    file: &ResourceFile<S>,
    filters: &[ResourceFilter],
    config: &ReadConfig<'_>,
) -> ExitCode {
    let mut code = ExitCode::Success;
    let resources = selected(file, filters, config.sort, &mut code);

    if matches!(config.format, DataFormat::Hex | DataFormat::Raw) && resources.len() != 1 {
        eprintln!(
            "Error: this format needs exactly one resource, but {} matched",
            resources.len()
        );
        return ExitCode::BadArgs;
    }
    if resources.is_empty() {
        eprintln!("Warning: no resources matched the filter");
        return ExitCode::Warning;
    }

    for resource in &resources {
        let data = if config.decompress {
            resource.data()
        } else {
            resource.raw_data()
        };
        let data = match data {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Error reading {}: {}", resource.resource_ref(), e);
                if matches!(config.format, DataFormat::Hex | DataFormat::Raw) {
                    return error_to_exit_code(&e);
                }
                code = ExitCode::Warning;
                continue;
            }
        };

        match config.format {
            DataFormat::Dump | DataFormat::DumpText => {
                let row = resource_row(resource, config.decompress, false, &mut code);
                println!("Resource {}:", describe(&row, true, false));
                if config.format == DataFormat::Dump {
                    for line in hexdump(data) {
                        println!("{line}");
                    }
                } else {
                    println!("{}", translate_text(data));
                }
                println!();
            }
            DataFormat::Hex | DataFormat::Raw => {
                if let Err(e) = write_data(data, config.format) {
                    eprintln!("Error writing output: {}", e);
                    return ExitCode::IoError;
                }
            }
        }
    }

    code
}

/// Read-header command implementation
pub fn read_header(source: &Source, path: &Path, format: DataFormat, part: HeaderPart) -> ExitCode {
    with_resource_file!(source, path, |file| {
        let system = file.system_data().as_slice();
        let application = file.application_data().as_slice();

        match format {
            DataFormat::Dump | DataFormat::DumpText => {
                let sections: Vec<(&str, &[u8])> = match part {
                    HeaderPart::System => vec![("System-reserved header data", system)],
                    HeaderPart::Application => {
                        vec![("Application-specific header data", application)]
                    }
                    HeaderPart::All => vec![
                        ("System-reserved header data", system),
                        ("Application-specific header data", application),
                    ],
                };
                for (title, data) in sections {
                    println!("{title}:");
                    if format == DataFormat::Dump {
                        for line in hexdump(data) {
                            println!("{line}");
                        }
                    } else {
                        println!("{}", translate_text(data));
                    }
                    println!();
                }
                ExitCode::Success
            }
            DataFormat::Hex | DataFormat::Raw => {
                let data = match part {
                    HeaderPart::System => system.to_vec(),
                    HeaderPart::Application => application.to_vec(),
                    HeaderPart::All => [system, application].concat(),
                };
                match write_data(&data, format) {
                    Ok(()) => ExitCode::Success,
                    Err(e) => {
                        eprintln!("Error writing output: {}", e);
                        ExitCode::IoError
                    }
                }
            }
        }
    })
}

/// Raw-compress-info command implementation
pub fn raw_compress_info(input: &Path, format: OutputFormat) -> ExitCode {
    let mut reader = match open_input(input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error opening {}: {}", input.display(), e);
            return ExitCode::IoError;
        }
    };

    match CompressedHeader::read_from(&mut reader) {
        Ok(header) => {
            print!("{}", create_formatter(format).format_compress_info(&header));
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            error_to_exit_code(&e)
        }
    }
}

/// Raw-decompress command implementation
pub fn raw_decompress(input: &Path, output: &Path) -> ExitCode {
    let reader = match open_input(input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error opening {}: {}", input.display(), e);
            return ExitCode::IoError;
        }
    };

    let mut decoder = match DecompressReader::new(reader) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return error_to_exit_code(&e);
        }
    };
    log::debug!(
        "{} bytes compressed with {}",
        decoder.header().decompressed_length,
        decoder.codec()
    );

    // The output is only created once the header is known to be valid.
    let mut writer: Box<dyn Write> = if output == Path::new("-") {
        Box::new(io::stdout().lock())
    } else {
        match File::create(output) {
            Ok(f) => Box::new(BufWriter::new(f)),
            Err(e) => {
                eprintln!("Error creating {}: {}", output.display(), e);
                return ExitCode::IoError;
            }
        }
    };

    match io::copy(&mut decoder, &mut writer).and_then(|_| writer.flush()) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let e = resfork::Error::from(e);
            eprintln!("Error: {}", e);
            error_to_exit_code(&e)
        }
    }
}

/// Opens a resource file, reading stdin for `-`.
fn open_resource_file(source: &Source, path: &Path) -> Result<Opened, ExitCode> {
    let options = OpenOptions::new().fork(source.fork);

    if path == Path::new("-") {
        if source.fork == ForkMode::Primary {
            eprintln!("Error: stdin has no resource fork");
            return Err(ExitCode::BadArgs);
        }
        log::debug!("reading resource data from stdin");
        return ResourceFile::open_sequential_with(io::stdin(), options)
            .map(Opened::Stdin)
            .map_err(|e| {
                eprintln!("Error opening stdin: {}", e);
                error_to_exit_code(&e)
            });
    }

    ResourceFile::open_path_with(path, options)
        .map(Opened::Path)
        .map_err(|e| {
            eprintln!("Error opening {}: {}", path.display(), e);
            error_to_exit_code(&e)
        })
}

/// Opens a plain input file, or stdin for `-`.
fn open_input(path: &Path) -> io::Result<Box<dyn Read + Send>> {
    if path == Path::new("-") {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Collects the resources matching `filters`, sorted by type and ID if
/// requested. Resources whose names cannot be read are reported and skipped.
fn selected<'a, S: ByteSource>(
    file: &'a ResourceFile<S>,
    filters: &[ResourceFilter],
    sort: bool,
    code: &mut ExitCode,
) -> Vec<Resource<'a, S>> {
    let mut resources = Vec::new();
    for resource in file {
        match select(filters, &resource) {
            Ok(true) => resources.push(resource),
            Ok(false) => {}
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", resource.resource_ref(), e);
                *code = ExitCode::Warning;
            }
        }
    }
    if sort {
        resources.sort_by_key(|r| (r.res_type(), r.id()));
    }
    resources
}

/// Gathers what a listing shows about one resource. Problems are reported on
/// stderr and downgrade `code` to a warning.
fn resource_row<S: ByteSource>(
    resource: &Resource<'_, S>,
    decompress: bool,
    technical: bool,
    code: &mut ExitCode,
) -> ResourceRow {
    let mut warn = |what: &str, e: &resfork::Error| {
        eprintln!("Warning: {} of {}: {}", what, resource.resource_ref(), e);
        *code = ExitCode::Warning;
    };

    let name = resource.name_bytes().unwrap_or_else(|e| {
        warn("name", &e);
        None
    });

    let length = match resource.raw_length() {
        Err(e) => {
            warn("length", &e);
            Length::Unreadable(e.to_string())
        }
        Ok(raw) if decompress && resource.is_compressed() => match resource.compressed_header() {
            Ok(Some(header)) => Length::Compressed {
                length: header.decompressed_length,
                raw,
            },
            Ok(None) => Length::Plain(raw),
            Err(e) => {
                warn("compressed header", &e);
                Length::BadHeader { raw }
            }
        },
        Ok(raw) => Length::Plain(raw),
    };

    let crc32 = if technical {
        let data = if decompress {
            resource.data()
        } else {
            resource.raw_data()
        };
        match data {
            Ok(d) => Some(crc32fast::hash(d)),
            Err(e) => {
                warn("data", &e);
                None
            }
        }
    } else {
        None
    };

    ResourceRow {
        res_type: resource.res_type(),
        id: resource.id(),
        name: name.map(<[u8]>::to_vec),
        attributes: resource.attributes(),
        data_offset: resource.data_offset(),
        length,
        crc32,
    }
}

/// Writes data as hex lines or as raw bytes to stdout.
fn write_data(data: &[u8], format: DataFormat) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if format == DataFormat::Hex {
        for line in raw_hexdump(data) {
            writeln!(out, "{line}")?;
        }
    } else {
        out.write_all(data)?;
    }
    out.flush()
}
