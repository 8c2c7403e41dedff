//! smcontainer CLI - inspect container files.

use std::env;
use std::path::Path;

use smcontainer::container::{Category, Container};
use smcontainer::shakemap::ShakeMapContainer;
use smcontainer::store::{Array, Attributes, ContainerOptions, Group, IStreams, Node, Payload};
use smcontainer::{Error, PlainOldDataType, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Leading elements shown per array by `dump`.
const PREVIEW_LEN: usize = 8;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level: Option<&str> = None;
    let mut options = ContainerOptions::default();
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = Some("debug"),
            "-vv" | "--trace" => level = Some("trace"),
            "-q" | "--quiet" => level = Some("off"),
            "--no-mmap" => options.use_mmap = false,
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "info" | "i" => with_file(&filtered_args, "info <file>", |path| cmd_info(path, &options)),
        "tree" | "t" => with_file(&filtered_args, "tree <file>", |path| cmd_tree(path, &options)),
        "dump" | "d" => {
            if filtered_args.len() < 3 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: smcontainer dump <file> <category/group/.../name>");
                std::process::exit(1);
            }
            cmd_dump(filtered_args[1], filtered_args[2], &options)
        }
        "version" | "-V" | "--version" => {
            print_version();
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        // Default: if file exists, show info; otherwise error
        other => {
            if Path::new(other).exists() {
                cmd_info(other, &options)
            } else {
                eprintln!("Unknown command: {}", other);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn with_file(args: &[&str], usage: &str, run: impl FnOnce(&str) -> Result<()>) -> Result<()> {
    match args.get(1) {
        Some(&path) => run(path),
        None => {
            eprintln!("Error: missing file argument");
            eprintln!("Usage: smcontainer {}", usage);
            std::process::exit(1);
        }
    }
}

fn print_version() {
    println!(
        "smcontainer {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("SMC_BUILD_DATE"),
        env!("SMC_BUILD_TIME")
    );
}

fn print_help() {
    print_version();
    println!();
    println!("USAGE:");
    println!("    smcontainer [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <file>              Show entry counts, data type and IMTs");
    println!("    t, tree   <file>              Show the full group hierarchy");
    println!("    d, dump   <file> <path>       Print one entry (e.g. dictionaries/config)");
    println!("    version                       Show version and build date");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Suppress log output");
    println!("    --no-mmap        Read the file without memory mapping");
    println!();
    println!("EXAMPLES:");
    println!("    smcontainer info shake_result.hdf");
    println!("    smcontainer tree shake_result.hdf");
    println!("    smcontainer dump shake_result.hdf arrays/imts/Larger/pga/mean");
    println!("    smcontainer -v dump shake_result.hdf dictionaries/info.json");
}

fn cmd_info(path: &str, options: &ContainerOptions) -> Result<()> {
    info!("Opening container: {}", path);
    let version = IStreams::open_opts(path, options.use_mmap)?.version();
    let c = ShakeMapContainer::open_with(path, options.clone())?;
    debug!("Container opened successfully");

    println!("Container: {}", path);
    println!("Format version: {}", version);
    println!();

    let inner = c.container();
    println!("Entries:");
    println!("  Dictionaries: {}", inner.get_dictionaries()?.len());
    println!("  Strings:      {}", inner.get_strings()?.len());
    println!("  Arrays:       {}", inner.get_arrays()?.len());
    println!("  DataFrames:   {}", inner.get_dataframes()?.len());
    println!();

    match c.get_data_type()? {
        Some(data_type) => println!("Data type: {}", data_type),
        None => println!("Data type: unset"),
    }
    for component in c.get_components(None)? {
        let imts = c.get_imts(Some(component.as_str()))?;
        println!("  {}: {}", component, imts.join(", "));
    }
    Ok(())
}

fn cmd_tree(path: &str, options: &ContainerOptions) -> Result<()> {
    info!("Opening container: {}", path);
    let c = Container::open_with(path, options.clone())?;
    let root = c.store()?.root();

    println!("{}", path);
    print_group(root, 1);
    println!();
    println!("Total nodes: {}", root.descendants());
    Ok(())
}

fn print_group(group: &Group, depth: usize) {
    let indent = "  ".repeat(depth);
    for (name, node) in group.children() {
        match node {
            Node::Group(child) => {
                println!("{}{}/{}", indent, name, format_attrs(child.attrs()));
                print_group(child, depth + 1);
            }
            Node::Dataset(dataset) => {
                let kind = match &dataset.payload {
                    Payload::Bytes(bytes) => format!("bytes, {}", bytes.len()),
                    Payload::Array { array, compressed } => format!(
                        "{} {}{}",
                        array.pod(),
                        array.dims(),
                        if *compressed { ", zlib" } else { "" }
                    ),
                };
                println!("{}{} [{}]{}", indent, name, kind, format_attrs(&dataset.attrs));
            }
        }
    }
}

fn format_attrs(attrs: &Attributes) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!(" {{{}}}", parts.join(", "))
}

fn cmd_dump(path: &str, entry: &str, options: &ContainerOptions) -> Result<()> {
    let mut segments: Vec<&str> = entry.split('/').filter(|s| !s.is_empty()).collect();
    let category = segments
        .first()
        .and_then(|s| Category::from_group_name(s))
        .ok_or_else(|| Error::InvalidArgument(format!("{} does not start with a category", entry)))?;
    if segments.len() < 2 {
        return Err(Error::InvalidArgument(format!("{} names no entry", entry)));
    }
    let name = segments.pop().unwrap_or_default();
    let groups = &segments[1..];

    info!("Opening container: {}", path);
    let c = Container::open_with(path, options.clone())?;
    match category {
        Category::Dictionaries => {
            let value: serde_json::Value = c.get_dictionary_as(groups, name)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Category::Strings => println!("{}", c.get_string(groups, name)?),
        Category::Arrays => {
            let (array, metadata) = c.get_array(groups, name)?;
            println!("Type:     {}", array.pod());
            println!("Shape:    {}", array.dims());
            println!("Metadata:{}", format_attrs(&metadata));
            println!("Values:   {}", preview(&array)?);
        }
        Category::DataFrames => {
            let frame = c.get_dataframe(groups, name)?;
            println!("{}", frame.column_names().join("\t"));
            for row in 0..frame.num_rows() {
                let cells: Vec<String> = frame
                    .row(row)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v.to_json().map(|j| j.to_string()))
                    .collect::<Result<_>>()?;
                println!("{}", cells.join("\t"));
            }
        }
    }
    Ok(())
}

fn preview(array: &Array) -> Result<String> {
    fn join<T: ToString>(values: Vec<T>, total: usize) -> String {
        let mut out: Vec<String> = values.iter().take(PREVIEW_LEN).map(T::to_string).collect();
        if total > PREVIEW_LEN {
            out.push(format!("... ({} more)", total - PREVIEW_LEN));
        }
        format!("[{}]", out.join(", "))
    }
    let n = array.len();
    Ok(match array.pod() {
        PlainOldDataType::Boolean => join(array.to_bools()?, n),
        PlainOldDataType::Uint8 => join(array.to_vec::<u8>()?, n),
        PlainOldDataType::Int8 => join(array.to_vec::<i8>()?, n),
        PlainOldDataType::Uint16 => join(array.to_vec::<u16>()?, n),
        PlainOldDataType::Int16 => join(array.to_vec::<i16>()?, n),
        PlainOldDataType::Uint32 => join(array.to_vec::<u32>()?, n),
        PlainOldDataType::Int32 => join(array.to_vec::<i32>()?, n),
        PlainOldDataType::Uint64 => join(array.to_vec::<u64>()?, n),
        PlainOldDataType::Int64 => join(array.to_vec::<i64>()?, n),
        PlainOldDataType::Float16 => join(array.to_vec::<half::f16>()?, n),
        PlainOldDataType::Float32 => join(array.to_vec::<f32>()?, n),
        PlainOldDataType::Float64 => join(array.to_vec::<f64>()?, n),
        PlainOldDataType::String => join(array.to_strings()?, n),
    })
}
