use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ipcc::subnet::Address;
use ipcc::{
    offset_value, subnets, CodeTable, CodeWord, Error, Record, SortedTable, V4Record, V6Record,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

/// Base path the ipdb ingestion tool writes its consolidated tables to.
const DEFAULT_BASE: &str = "/usr/local/etc/ipdb/IPRanges/ipcc.bst";

#[derive(Parser)]
#[command(name = "ipcc")]
#[command(version)]
#[command(
    about = "Look up and tabulate country codes for IP address ranges",
    long_about = "ipcc - IP-range-to-country-code lookups over binary sorted tables\n\n\
    Reads the consolidated range tables (<base>.v4 / <base>.v6) produced by the\n\
    'ipdb' ingestion tool and either looks up single addresses or generates\n\
    sorted IP/masklen pairs per country, formatted as ipfw table construction\n\
    directives.\n\n\
    Examples:\n\
      ipcc lookup 93.184.216.34\n\
      ipcc table -t BR=10000:DE=10100:US -n 7\n\
      ipcc table -t \"\" -p -4\n\
      ipcc encode DE"
)]
struct Cli {
    /// Base path to the binary sorted tables (.v4 and .v6) with the
    /// consolidated IP ranges generated by the 'ipdb' tool
    #[arg(
        short = 'r',
        long = "ranges",
        global = true,
        default_value = DEFAULT_BASE,
        value_name = "BASE"
    )]
    ranges: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the country code an IPv4 or IPv6 address belongs to
    Lookup {
        /// IPv4 or IPv6 address
        #[arg(value_name = "ADDRESS")]
        address: String,
    },

    /// Generate sorted IP/masklen pairs per country as ipfw table directives
    Table {
        /// Colon-separated country filter, e.g. BR=10000:DE=10100:US:CA.
        /// A table value may be assigned per code; an empty list means any
        /// country
        #[arg(short = 't', long = "countries", default_value = "", value_name = "LIST")]
        countries: String,

        /// ipfw table number
        #[arg(
            short = 'n',
            long = "number",
            default_value_t = 0,
            value_parser = clap::value_parser!(u32).range(..=65534),
            value_name = "NUM"
        )]
        number: u32,

        /// Global 32-bit value for all table entries (0 means none)
        #[arg(
            short = 'v',
            long = "value",
            default_value_t = 0,
            conflicts_with = "offset",
            value_name = "VALUE"
        )]
        value: u32,

        /// Derive each entry's value from its country code:
        /// value = offset + ((C1-'A')*26 + (C2-'A')) * 10
        #[arg(short = 'x', long = "offset", value_name = "OFFSET")]
        offset: Option<i32>,

        /// Plain IP table output, without ipfw table construction
        /// directives (ignores -n, -v and -x)
        #[arg(short = 'p', long = "plain")]
        plain: bool,

        /// Process only the IPv4 address ranges
        #[arg(short = '4', long = "only4", conflicts_with = "only6")]
        only4: bool,

        /// Process only the IPv6 address ranges
        #[arg(short = '6', long = "only6")]
        only6: bool,
    },

    /// Print the encoded value of a country code (see --offset)
    Encode {
        /// Two-letter country code
        #[arg(value_name = "CC")]
        code: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Lookup { address } => cmd_lookup(&cli.ranges, &address),
        Commands::Table {
            countries,
            number,
            value,
            offset,
            plain,
            only4,
            only6,
        } => {
            let opts = TableOpts {
                number,
                value,
                offset,
                plain,
            };
            cmd_table(&cli.ranges, &countries, &opts, only4, only6)
        }
        Commands::Encode { code } => cmd_encode(&code),
    }
}

/// `<base>` + `.v4` / `.v6`.
fn family_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn open_family<R: Record>(base: &Path) -> Result<Option<SortedTable<R>>> {
    let path = family_path(base, R::SUFFIX);
    SortedTable::open(&path).with_context(|| format!("loading {}", path.display()))
}

fn cmd_lookup(base: &Path, address: &str) -> Result<()> {
    let address: IpAddr = address
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;
    match address {
        IpAddr::V4(addr) => {
            let table = require_family::<V4Record>(base)?;
            match table.lookup(addr.into()) {
                Some(record) => println!(
                    "{} in {} - {} in {}",
                    addr,
                    Ipv4Addr::from(record.lo()),
                    Ipv4Addr::from(record.hi()),
                    record.code()
                ),
                None => println!("{} not found.", addr),
            }
        }
        IpAddr::V6(addr) => {
            let table = require_family::<V6Record>(base)?;
            match table.lookup(addr.into()) {
                Some(record) => println!(
                    "{} in {} - {} in {}",
                    addr,
                    Ipv6Addr::from(record.lo()),
                    Ipv6Addr::from(record.hi()),
                    record.code()
                ),
                None => println!("{} not found.", addr),
            }
        }
    }
    Ok(())
}

fn require_family<R: Record>(base: &Path) -> Result<SortedTable<R>> {
    match open_family::<R>(base)? {
        Some(table) => Ok(table),
        None => bail!(
            "no range data: {} is missing or empty",
            family_path(base, R::SUFFIX).display()
        ),
    }
}

struct TableOpts {
    number: u32,
    value: u32,
    offset: Option<i32>,
    plain: bool,
}

fn cmd_table(base: &Path, countries: &str, opts: &TableOpts, only4: bool, only6: bool) -> Result<()> {
    let filter = CodeTable::parse_list(countries)?;

    let mut loaded_any = false;
    if !only6 {
        loaded_any |= emit_family::<V4Record>(base, &filter, opts, |addr| {
            Ipv4Addr::from(addr).to_string()
        })?;
    }
    if !only4 {
        loaded_any |= emit_family::<V6Record>(base, &filter, opts, |addr| {
            Ipv6Addr::from(addr).to_string()
        })?;
    }
    if !loaded_any {
        bail!("no range data found under {}", base.display());
    }
    Ok(())
}

/// Emit the directives for one address family. Returns whether the
/// family's table file was present.
fn emit_family<R: Record>(
    base: &Path,
    filter: &CodeTable,
    opts: &TableOpts,
    format_addr: impl Fn(R::Key) -> String,
) -> Result<bool>
where
    R::Key: Address,
{
    let Some(table) = open_family::<R>(base)? else {
        eprintln!(
            "{} is missing or empty, skipping this address family",
            family_path(base, R::SUFFIX).display()
        );
        return Ok(false);
    };

    for record in table.records() {
        let per_code = if filter.is_empty() {
            0
        } else {
            match filter.find(record.code()) {
                Some(assigned) => assigned,
                None => continue, // country not in the filter list
            }
        };

        for (start, len) in subnets(record.lo(), record.hi()) {
            let addr = format_addr(start);
            if opts.plain {
                println!("{}/{}", addr, len);
                continue;
            }
            // explicit per-code value > global flat value > code-offset value > none
            let value = if per_code != 0 {
                Some(per_code)
            } else if opts.value != 0 {
                Some(opts.value)
            } else {
                opts.offset.map(|off| offset_value(record.code(), off))
            };
            match value {
                Some(value) => println!("table {} add {}/{} {}", opts.number, addr, len, value),
                None => println!("table {} add {}/{}", opts.number, addr, len),
            }
        }
    }
    Ok(true)
}

fn cmd_encode(code: &str) -> Result<()> {
    let code: CodeWord = code.parse()?;
    println!("{} encodes to {}", code, offset_value(code, 0));
    Ok(())
}
