use clap::{Parser, Subcommand};
use elf::ElfBytes;
use gimli::{read::Dwarf, AttributeValue, EndianSlice, LittleEndian, LocationLists, RangeLists};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use symbolicator::SymbolTableBuilder;

#[derive(Parser)]
#[command(name = "symbolicator")]
#[command(about = "Builds monitor symbol tables from kernel debug info")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a symbol table from an ELF binary with DWARF debug info
    Generate {
        /// Input ELF file with debug symbols
        #[arg(short, long)]
        input: PathBuf,

        /// Output symbol table file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_debug_sections<'a>(
    elf: &'a ElfBytes<'a, elf::endian::LittleEndian>,
) -> Option<Dwarf<EndianSlice<'a, LittleEndian>>> {
    let load_section = |name: &str| -> EndianSlice<LittleEndian> {
        match elf.section_header_by_name(name) {
            Ok(Some(header)) => match elf.section_data(&header) {
                Ok((data, _)) => EndianSlice::new(data, LittleEndian),
                Err(_) => EndianSlice::new(&[], LittleEndian),
            },
            _ => EndianSlice::new(&[], LittleEndian),
        }
    };

    let dwarf = Dwarf {
        debug_abbrev: load_section(".debug_abbrev").into(),
        debug_addr: load_section(".debug_addr").into(),
        debug_aranges: load_section(".debug_aranges").into(),
        debug_info: load_section(".debug_info").into(),
        debug_line: load_section(".debug_line").into(),
        debug_line_str: load_section(".debug_line_str").into(),
        debug_str: load_section(".debug_str").into(),
        debug_str_offsets: load_section(".debug_str_offsets").into(),
        debug_types: load_section(".debug_types").into(),
        locations: LocationLists::new(
            load_section(".debug_loc").into(),
            load_section(".debug_loclists").into(),
        ),
        ranges: RangeLists::new(
            load_section(".debug_ranges").into(),
            load_section(".debug_rnglists").into(),
        ),
        ..Default::default()
    };

    Some(dwarf)
}

fn generate(input: PathBuf, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file_data = fs::read(&input)?;
    let elf = ElfBytes::<elf::endian::LittleEndian>::minimal_parse(&file_data)?;

    let dwarf = load_debug_sections(&elf).ok_or("Failed to load debug sections")?;

    let function_map = build_function_map(&dwarf)?;

    let mut unit_headers = Vec::new();
    let mut units = dwarf.units();
    while let Ok(Some(header)) = units.next() {
        unit_headers.push(header);
    }

    let line_entries: Vec<_> = unit_headers
        .par_iter()
        .flat_map(|header| {
            let unit = match dwarf.unit(*header) {
                Ok(unit) => unit,
                Err(_) => return Vec::new(),
            };

            let line_program = match unit.line_program.clone() {
                Some(program) => program,
                None => return Vec::new(),
            };

            let header = line_program.header().clone();
            let mut rows = line_program.rows();
            let mut entries = Vec::new();

            while let Ok(Some((_, row))) = rows.next_row() {
                let address = row.address();
                let line = row.line().map(|l| l.get()).unwrap_or(0);

                if line == 0 {
                    continue;
                }

                let file = match row.file(&header) {
                    Some(file_entry) => {
                        let dir = file_entry
                            .directory(&header)
                            .and_then(|dir| dwarf.attr_string(&unit, dir).ok())
                            .map(|s| s.to_string_lossy().into_owned());

                        let file_name = dwarf
                            .attr_string(&unit, file_entry.path_name())
                            .ok()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "<unknown>".into());

                        if let Some(d) = dir {
                            if !d.is_empty() {
                                format!("{}/{}", d, file_name)
                            } else {
                                file_name
                            }
                        } else {
                            file_name
                        }
                    }
                    None => "<unknown>".into(),
                };

                let (function_name, function_start) =
                    match find_function_for_address(&function_map, address) {
                        Some(function) => (function.name.as_str(), function.low),
                        None => ("<unknown>", address),
                    };

                entries.push((
                    address,
                    function_name.to_string(),
                    function_start,
                    file,
                    line as u32,
                ));
            }

            entries
        })
        .collect();

    let mut builder = SymbolTableBuilder::new();
    for (address, function_name, function_start, file, line) in line_entries {
        builder.add_line(address, &function_name, function_start, &file, line);
    }

    let output_data = builder.build();

    let mut file = fs::File::create(&output)?;
    file.write_all(output_data.as_bytes())?;

    Ok(())
}

struct FunctionRange {
    low: u64,
    high: u64,
    name: String,
}

fn build_function_map(
    dwarf: &Dwarf<EndianSlice<LittleEndian>>,
) -> Result<Vec<FunctionRange>, Box<dyn std::error::Error>> {
    let mut functions = Vec::new();
    let mut units = dwarf.units();
    while let Ok(Some(header)) = units.next() {
        let unit = match dwarf.unit(header) {
            Ok(unit) => unit,
            Err(_) => continue,
        };

        let mut entries = unit.entries();
        while let Ok(Some((_, entry))) = entries.next_dfs() {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }

            let mut low_pc = None;
            let mut high_pc = None;
            let mut ranges_offset = None;
            let mut name = None;
            let mut linkage_name = None;

            let mut attrs = entry.attrs();
            while let Ok(Some(attr)) = attrs.next() {
                match attr.name() {
                    gimli::DW_AT_low_pc => {
                        if let AttributeValue::Addr(addr) = attr.value() {
                            low_pc = Some(addr);
                        }
                    }
                    gimli::DW_AT_high_pc => match attr.value() {
                        AttributeValue::Addr(addr) => high_pc = Some(addr),
                        AttributeValue::Udata(offset) => {
                            if let Some(low) = low_pc {
                                high_pc = Some(low + offset);
                            }
                        }
                        _ => {}
                    },
                    gimli::DW_AT_ranges => {
                        ranges_offset = match attr.value() {
                            AttributeValue::RangeListsRef(offset) => {
                                Some(dwarf.ranges_offset_from_raw(&unit, offset))
                            }
                            _ => None,
                        };
                    }
                    gimli::DW_AT_name => {
                        if let AttributeValue::DebugStrRef(offset) = attr.value() {
                            if let Ok(s) = dwarf.debug_str.get_str(offset) {
                                name = Some(s.to_string_lossy().into_owned());
                            }
                        }
                    }
                    gimli::DW_AT_linkage_name => {
                        if let AttributeValue::DebugStrRef(offset) = attr.value() {
                            if let Ok(s) = dwarf.debug_str.get_str(offset) {
                                linkage_name = Some(s.to_string_lossy().into_owned());
                            }
                        }
                    }
                    _ => {}
                }
            }

            // Prefer linkage_name (mangled) for demangling, fall back to name
            let func_name = match linkage_name.or(name) {
                Some(n) => n,
                None => continue,
            };

            let demangled = rustc_demangle::try_demangle(&func_name)
                .ok()
                .map(|d| format!("{:#}", d))
                .unwrap_or(func_name);

            // Try low_pc/high_pc first
            if let (Some(low), Some(high)) = (low_pc, high_pc) {
                functions.push(FunctionRange {
                    low,
                    high,
                    name: demangled,
                });
            } else if let Some(ranges_offset) = ranges_offset {
                // Try ranges if low_pc/high_pc not available
                if let Ok(mut ranges) = dwarf.ranges(&unit, ranges_offset) {
                    while let Ok(Some(range)) = ranges.next() {
                        functions.push(FunctionRange {
                            low: range.begin,
                            high: range.end,
                            name: demangled.clone(),
                        });
                    }
                }
            }
        }
    }

    // Sort by low address for binary search
    functions.sort_by_key(|f| f.low);
    Ok(functions)
}

fn find_function_for_address(functions: &[FunctionRange], address: u64) -> Option<&FunctionRange> {
    // Binary search to find the function containing this address
    let idx = functions.binary_search_by(|f| {
        if address < f.low {
            std::cmp::Ordering::Greater
        } else if address >= f.high {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Equal
        }
    });

    match idx {
        Ok(i) => Some(&functions[i]),
        Err(_) => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Generate { input, output } => generate(input, output),
    }
}
