//! partplan - automatic partition layout planner
//!
//! Plans EFI, root and swap partitions for a whole device, or replaces a
//! single partition or free-space region with a root partition.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use partplan::backend::{OperationQueue, SfdiskBackend};
use partplan::config::{PlanConfig, ReplacePartitionOptions, SwapChoice};
use partplan::disk::device::{list_block_devices, Device};
use partplan::disk::probe::probe_table;
use partplan::disk::region::{Region, SectorRange};
use partplan::disk::size::parse_bytes;
use partplan::plan::{
    apply_auto_layout, compute_auto_layout, decide_swap, infer_replacement_role, plan_replacement,
    AutoLayout,
};
use partplan::system::memory::MEMTOTAL_OVERESTIMATION;
use partplan::system::MemoryInfo;
use partplan::utils::command::CommandRunner;
use partplan::utils::error::PartplanError;
use partplan::utils::prompt::{prompt_passphrase, prompt_select, warn_confirm};

#[derive(Parser)]
#[command(name = "partplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dry run mode - show what would be done without making changes
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a from-scratch layout and print the resulting operations
    Plan {
        /// Path to plan file
        #[arg(short, long)]
        config: Option<String>,

        /// Target disk device (e.g., /dev/sda)
        #[arg(short, long)]
        device: Option<String>,

        /// Print operations as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan a from-scratch layout and write it to the device
    Apply {
        /// Path to plan file
        #[arg(short, long)]
        config: String,

        /// Target disk device, overriding the plan file
        #[arg(short, long)]
        device: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace one partition or free-space region with a root partition
    Replace {
        /// Target disk device
        #[arg(short, long)]
        device: String,

        /// Partition number to replace; prompts when neither this nor --free is given
        #[arg(short, long, conflicts_with = "free")]
        partition: Option<u32>,

        /// Index of the free-space region to fill, as listed by `regions`
        #[arg(short, long)]
        free: Option<usize>,

        /// Encryption passphrase ("-" prompts for it)
        #[arg(long, env = "PARTPLAN_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,

        /// Write the change instead of only printing it
        #[arg(long)]
        apply: bool,
    },

    /// List partitions and free-space regions of a device
    Regions {
        /// Target disk device
        #[arg(short, long)]
        device: String,
    },

    /// Show the swap size the planner would choose
    Swap {
        /// Space available for root and swap (e.g., 120GiB)
        #[arg(short, long)]
        available: String,

        #[arg(short, long, value_enum, default_value_t = SwapChoice::SmallSwap)]
        choice: SwapChoice,

        /// Installed memory; read from /proc/meminfo when omitted
        #[arg(short, long)]
        ram: Option<String>,

        /// Overestimation factor applied to the memory size
        #[arg(short, long)]
        factor: Option<f64>,

        /// Space the installation needs on root
        #[arg(long, default_value = "0")]
        required: String,
    },

    /// List available disks
    ListDisks {
        /// Show all block devices, not just suitable targets
        #[arg(short, long)]
        all: bool,
    },

    /// Generate a sample plan file
    GenerateConfig {
        /// Output path for plan file
        #[arg(short, long, default_value = "partplan.toml")]
        output: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dry_run = cli.dry_run;
    if dry_run {
        info!("Running in dry-run mode - no changes will be made");
    }

    match cli.command {
        Commands::Plan {
            config,
            device,
            json,
        } => cmd_plan(config, device, json)?,
        Commands::Apply {
            config,
            device,
            yes,
        } => cmd_apply(&config, device, yes, dry_run)?,
        Commands::Replace {
            device,
            partition,
            free,
            passphrase,
            apply,
        } => cmd_replace(&device, partition, free, passphrase, apply, dry_run)?,
        Commands::Regions { device } => cmd_regions(&device)?,
        Commands::Swap {
            available,
            choice,
            ram,
            factor,
            required,
        } => cmd_swap(&available, choice, ram.as_deref(), factor, &required)?,
        Commands::ListDisks { all } => cmd_list_disks(all)?,
        Commands::GenerateConfig { output } => cmd_generate_config(&output)?,
    }

    Ok(())
}

fn require_root() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        return Err(PartplanError::NotRoot.into());
    }
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<PlanConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading plan from {}", path);
            PlanConfig::from_file(path)?
        }
        None => PlanConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn print_layout(device: &Device, layout: &AutoLayout) {
    println!(
        "{} {} ({}, {} of {})",
        "Device:".bold(),
        device.path,
        device.capacity.human(),
        device.total_sectors,
        device.logical_sector_size
    );
    println!(
        "{} {}, {} table, default filesystem {}",
        "Layout:".bold(),
        layout.firmware,
        layout.table_type,
        layout.filesystem
    );
    println!("{}", "-".repeat(60));

    let row = |label: &str, range: &SectorRange| {
        println!(
            "{:<8} {:>24} {:>12}",
            label,
            range.to_string(),
            device.bytes_for(range.len()).human()
        );
    };
    if let Some(esp) = &layout.efi {
        row("efi", &esp.range);
    }
    row("root", &layout.root);
    match &layout.swap_partition {
        Some(swap) => row("swap", &swap.range),
        None if layout.swap.suggested.as_u64() > 0 => println!(
            "{}",
            format!(
                "swap     skipped, {} does not fit",
                layout.swap.suggested.human()
            )
            .yellow()
        ),
        None => {}
    }
}

fn cmd_plan(config_path: Option<String>, device: Option<String>, json: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let device = config.resolve_device(device.as_deref())?;
    let ctx = config.context()?;

    let layout = compute_auto_layout(&ctx, &device, &config.options)?;
    let mut queue = OperationQueue::new();
    apply_auto_layout(&mut queue, &device, &layout, config.options.passphrase())?;

    if json {
        println!("{}", serde_json::to_string_pretty(queue.operations())?);
        return Ok(());
    }

    print_layout(&device, &layout);
    println!();
    println!("{}", "Operations:".bold());
    for (i, op) in queue.operations().iter().enumerate() {
        println!("  {}. {}", i + 1, op.describe());
    }
    Ok(())
}

fn cmd_apply(config_path: &str, device: Option<String>, yes: bool, dry_run: bool) -> Result<()> {
    require_root()?;

    let config = load_config(Some(config_path))?;
    let device = config.resolve_device(device.as_deref())?;
    let ctx = config.context()?;

    let layout = compute_auto_layout(&ctx, &device, &config.options)?;
    print_layout(&device, &layout);

    if !dry_run && !yes {
        let warning = format!("All data on {} will be destroyed", device.path);
        if !warn_confirm(&warning)? {
            return Err(PartplanError::UserCancelled.into());
        }
    }

    let cmd = CommandRunner::new(dry_run);
    let mut backend = SfdiskBackend::new(&cmd);
    apply_auto_layout(&mut backend, &device, &layout, config.options.passphrase())?;

    println!("{} Layout written to {}", "✓".green(), device.path);
    Ok(())
}

fn select_region(mut regions: Vec<Region>, partition: Option<u32>, free: Option<usize>) -> Result<Region> {
    if let Some(n) = partition {
        return regions
            .into_iter()
            .find(|r| r.number == Some(n))
            .ok_or_else(|| PartplanError::RegionNotFound(format!("partition {}", n)).into());
    }
    if let Some(index) = free {
        return regions
            .into_iter()
            .filter(Region::is_free_space)
            .nth(index)
            .ok_or_else(|| PartplanError::RegionNotFound(format!("free region #{}", index)).into());
    }

    if regions.is_empty() {
        return Err(PartplanError::RegionNotFound("no regions on device".to_string()).into());
    }
    let items: Vec<String> = regions.iter().map(Region::describe).collect();
    let choice = prompt_select("Region to replace", &items, 0)?;
    Ok(regions.swap_remove(choice))
}

fn cmd_replace(
    device_path: &str,
    partition: Option<u32>,
    free: Option<usize>,
    passphrase: Option<String>,
    apply: bool,
    dry_run: bool,
) -> Result<()> {
    let device = Device::probe(device_path)?;
    let probed = probe_table(&device)?;
    let region = select_region(probed.regions, partition, free)?;

    let passphrase = match passphrase.as_deref() {
        Some("-") => prompt_passphrase("Encryption passphrase")?,
        Some(p) => p.to_string(),
        None => String::new(),
    };
    let options = ReplacePartitionOptions { passphrase };

    println!(
        "{} {} becomes a {} partition",
        "Replace:".bold(),
        region.describe(),
        infer_replacement_role(region.role)
    );

    if !apply {
        let mut queue = OperationQueue::new();
        plan_replacement(&mut queue, &device, region, &options)?;
        for (i, op) in queue.operations().iter().enumerate() {
            println!("  {}. {}", i + 1, op.describe());
        }
        println!("{}", "Nothing written; pass --apply to modify the device".yellow());
        return Ok(());
    }

    require_root()?;
    if !dry_run && !region.is_free_space() {
        let warning = format!("{} will be deleted", region.describe());
        if !warn_confirm(&warning)? {
            return Err(PartplanError::UserCancelled.into());
        }
    }

    let cmd = CommandRunner::new(dry_run);
    let mut backend = SfdiskBackend::new(&cmd).with_existing_table(probed.table);
    let role = plan_replacement(&mut backend, &device, region, &options)?;
    println!("{} New {} partition written to {}", "✓".green(), role, device.path);
    Ok(())
}

fn cmd_regions(device_path: &str) -> Result<()> {
    let device = Device::probe(device_path)?;
    let probed = probe_table(&device)?;

    match probed.table {
        Some(table) => println!("{} {} ({})", "Table:".bold(), table, device.capacity.human()),
        None => println!("{} unknown ({})", "Table:".bold(), device.capacity.human()),
    }
    println!("{:<6} {:<12} {:<22} {:>24} {:>10}", "FREE", "PARTITION", "ROLE", "SECTORS", "SIZE");
    println!("{}", "-".repeat(78));

    let mut free_index = 0;
    for region in &probed.regions {
        let size = device.bytes_for(region.range.len()).human();
        let (index, name) = if region.is_free_space() {
            free_index += 1;
            ((free_index - 1).to_string(), "-".to_string())
        } else {
            (
                "-".to_string(),
                region.node.clone().unwrap_or_else(|| "-".to_string()),
            )
        };
        let line = format!(
            "{:<6} {:<12} {:<22} {:>24} {:>10}",
            index,
            name,
            region.role.to_string(),
            region.range.to_string(),
            size
        );
        if region.is_free_space() {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_swap(
    available: &str,
    choice: SwapChoice,
    ram: Option<&str>,
    factor: Option<f64>,
    required: &str,
) -> Result<()> {
    let available = parse_bytes(available)?;
    let required = parse_bytes(required)?;
    let memory = match ram {
        Some(ram) => MemoryInfo::new(parse_bytes(ram)?, factor.unwrap_or(MEMTOTAL_OVERESTIMATION)),
        None => {
            let detected = MemoryInfo::detect()?;
            MemoryInfo::new(
                detected.total_ram,
                factor.unwrap_or(detected.overestimation_factor),
            )
        }
    };

    let decision = decide_swap(available, choice, required, &memory);
    let suggested = decision.suggested;

    println!("{} {}", "Choice:".bold(), choice);
    println!(
        "{} {} (factor {})",
        "Memory:".bold(),
        memory.total_ram.human(),
        memory.overestimation_factor
    );
    println!(
        "{} {} ({} bytes)",
        "Suggested:".bold(),
        suggested.human(),
        suggested.as_u64()
    );
    if decision.create {
        println!("{}", "Swap partition fits".green());
    } else if choice.creates_partition() {
        println!("{}", "Swap partition does not fit".yellow());
    } else {
        println!("No swap partition for this choice");
    }
    Ok(())
}

fn cmd_list_disks(all: bool) -> Result<()> {
    let devices = list_block_devices(all)?;

    if devices.is_empty() {
        println!("No suitable disks found.");
        return Ok(());
    }

    println!(
        "{:<15} {:>10} {:>7} {:<20} {}",
        "DEVICE", "SIZE", "SECTOR", "MODEL", "TYPE"
    );
    println!("{}", "-".repeat(68));

    for dev in devices {
        println!(
            "{:<15} {:>10} {:>7} {:<20} {}",
            dev.path,
            dev.size_human(),
            dev.logical_sector_size,
            dev.model.as_deref().unwrap_or("-"),
            dev.device_type
        );
    }

    Ok(())
}

fn cmd_generate_config(output: &str) -> Result<()> {
    let sample = PlanConfig::sample();
    let content = toml::to_string_pretty(&sample)?;
    std::fs::write(output, content)?;
    println!("{} Sample plan written to {}", "✓".green(), output);
    Ok(())
}
