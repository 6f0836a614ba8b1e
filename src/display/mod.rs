// Author: kelexine (https://github.com/kelexine)
// display/mod.rs — Colored terminal output for detection reports and snapshot listings

use colored::*;

use lockscan::deadlock::dump::{ProcessRecord, PrimitiveRecord};
use lockscan::deadlock::{Cycle, LockId, Report, Step};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn fmt_id(id: u64) -> String {
    format!("{:#x}", id)
}

fn fmt_lock(lock: LockId, label: Option<&str>) -> String {
    match label {
        Some(name) => format!("{} ({})", fmt_id(lock), name),
        None => fmt_id(lock),
    }
}

fn process_title(pid: u64, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Process {} [{}]", fmt_id(pid), name),
        None => format!("Process {}", fmt_id(pid)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Detection report
// ─────────────────────────────────────────────────────────────────────────────

/// Describe the closed loop one edge per line:
/// `thread A waits on lock L held by thread B`.
pub fn describe_cycle(cycle: &Cycle, label: impl Fn(LockId) -> Option<String>) -> Vec<String> {
    let steps = cycle.loop_steps();
    let mut lines = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        let Step::Waiter { node, .. } = step else {
            continue;
        };
        // A waiter is reached from the owner of its lock, i.e. the preceding
        // step (wrapping around the loop)
        let holder = if i == 0 {
            steps.last()
        } else {
            steps.get(i - 1)
        };
        let holder = holder.map(Step::thread);
        let lock = fmt_lock(node.lock, label(node.lock).as_deref());
        match holder {
            Some(holder) => lines.push(format!(
                "thread {} waits on lock {} held by thread {}",
                fmt_id(node.thread),
                lock,
                fmt_id(holder)
            )),
            None => lines.push(format!(
                "thread {} waits on lock {}",
                fmt_id(node.thread),
                lock
            )),
        }
    }
    lines
}

pub fn display_report(report: &Report, detailed: bool, show_skipped: bool) {
    println!();
    println!(
        "{}",
        process_title(report.pid, report.process_name.as_deref()).bold()
    );
    println!("{}", "=".repeat(70));
    println!(
        "{} Owner records:  {}",
        "[INFO]   ".blue(),
        report.owners.len()
    );
    println!(
        "{} Waiter records: {}",
        "[INFO]   ".blue(),
        report.waiters.len()
    );

    if !report.skipped.is_empty() {
        println!(
            "{} {} primitive(s) skipped (query failed)",
            "[WARN]   ".yellow(),
            report.skipped.len()
        );
        if show_skipped {
            for skipped in &report.skipped {
                println!(
                    "           {} {}",
                    fmt_lock(skipped.id, report.label(skipped.id)).yellow(),
                    skipped.reason.dimmed()
                );
            }
        }
    }

    if detailed {
        display_nodes(report);
    }

    match &report.cycle {
        Some(cycle) => {
            println!(
                "{} {}",
                "[DEADLOCK]".red().bold(),
                format!("{} thread(s) in a wait cycle", cycle.threads().len()).bold()
            );
            let lines = describe_cycle(cycle, |lock| report.label(lock).map(str::to_string));
            for line in lines {
                println!("           {} {}", "→".red(), line);
            }
            if cycle.closes_at > 0 {
                println!(
                    "           {}",
                    format!("(reached via {} lead-in record(s))", cycle.closes_at).dimmed()
                );
            }
        }
        None => {
            println!("{} No deadlock detected", "[SUCCESS]".green().bold());
        }
    }
}

fn display_nodes(report: &Report) {
    println!();
    println!("  {:<12} {:<30}", "Owner".bold(), "Lock".bold());
    println!("  {}", "─".repeat(44).dimmed());
    for owner in &report.owners {
        println!(
            "  {:<12} {:<30}",
            fmt_id(owner.thread).cyan(),
            fmt_lock(owner.lock, report.label(owner.lock))
        );
    }
    println!();
    println!("  {:<12} {:<30}", "Waiter".bold(), "Lock".bold());
    println!("  {}", "─".repeat(44).dimmed());
    for waiter in &report.waiters {
        println!(
            "  {:<12} {:<30}",
            fmt_id(waiter.thread).cyan(),
            fmt_lock(waiter.lock, report.label(waiter.lock))
        );
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot listings
// ─────────────────────────────────────────────────────────────────────────────

pub fn display_processes(processes: &[ProcessRecord]) {
    println!();
    println!("{:<14} {:<24} {:>10}", "PID".bold(), "Name".bold(), "Primitives".bold());
    println!("{}", "─".repeat(50).dimmed());
    for process in processes {
        println!(
            "{:<14} {:<24} {:>10}",
            fmt_id(process.pid).cyan(),
            process.name.as_deref().unwrap_or("-"),
            process.primitives.len()
        );
    }
    println!();
    println!(
        "{} {} process(es) in snapshot",
        "[INFO]   ".blue(),
        processes.len()
    );
}

pub fn display_primitives(process: &ProcessRecord) {
    println!();
    println!(
        "{}",
        process_title(process.pid, process.name.as_deref()).bold()
    );
    println!(
        "{:<12} {:<20} {:<12} {}",
        "Id".bold(),
        "Name".bold(),
        "Owner".bold(),
        "Waiters".bold()
    );
    println!("{}", "─".repeat(70).dimmed());
    for primitive in &process.primitives {
        println!("{}", primitive_row(primitive));
    }
}

fn primitive_row(primitive: &PrimitiveRecord) -> String {
    let name = primitive.name.as_deref().unwrap_or("-");
    if let Some(error) = &primitive.error {
        return format!(
            "{:<12} {:<20} {}",
            fmt_id(primitive.id),
            name,
            format!("query failed: {}", error).yellow()
        );
    }
    let owner = primitive.owner.map(fmt_id).unwrap_or_else(|| "-".to_string());
    let waiters = if primitive.waiters.is_empty() {
        "-".to_string()
    } else {
        primitive
            .waiters
            .iter()
            .map(|w| fmt_id(*w))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{:<12} {:<20} {:<12} {}",
        fmt_id(primitive.id),
        name,
        owner,
        waiters
    )
}
