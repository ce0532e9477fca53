use std::io::{stdin, stdout, Write};

use anyhow::Result;
use cache_sim::{
    cache::Cache,
    common::{AccessKind, Addr, Level},
    sim::Simulator,
};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

peg::parser!(grammar command() for str {
    rule radix() -> u64
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9'|'a'..='f'|'A'..='F']+})
        {? u64::from_str_radix(n, 16).map_err(|_| "64-bit address") }
        / n:$(quiet!{['0'..='9']+}) {? n.parse().map_err(|_| "64-bit address") }
        / expected!("address")
    rule read() = "read" / "r"
    rule write() = "write" / "w"
    rule kind() -> AccessKind
        = write() { AccessKind::Write }
        / read() { AccessKind::Read }
    rule level() -> Level
        = ("l1" / "L1") { Level::L1 }
        / ("victim" / "vc") { Level::Victim }
        / ("l2" / "L2") { Level::L2 }
        / "all" { Level::L1 | Level::Victim | Level::L2 }
        / expected!("l1, vc, l2 or all")
    rule levels() -> Level
        = ls:(level() ++ (_ "," _ / __)) {
            ls.into_iter().fold(Level::none(), |acc, l| acc | l)
        }
    rule at() -> u64 = __ "at" __ a:radix() { a }
    pub(crate) rule parse_command() -> Command
        = _ k:kind() __ addr:radix() _ { Command::Access(k, addr) }
        / _ "show" __ levels:levels() at:at()? _ { Command::Show { levels, at } }
        / _ "stat" "s"? _ { Command::Stat }
        / _ ("help" / "?") _ { Command::Help }
        / _ ("exit" / "quit" / "q") _ { Command::Exit }
        / expected!("command")

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

#[derive(Debug, PartialEq)]
pub(crate) enum Command {
    Access(AccessKind, u64),
    Show { levels: Level, at: Option<u64> },
    Stat,
    Help,
    Exit,
}

const HELP: &str = "\
commands:
  r|read <addr>                 issue a read
  w|write <addr>                issue a write
  show <l1|vc|l2|all>.. [at <addr>]
                                dump cache contents (only the set of <addr> if given)
  stat                          statistics so far
  help                          this message
  exit|quit                     leave interactive mode";

pub fn execute_interactive(sim: &mut Simulator) -> Result<()> {
    #[cfg(feature = "stat")]
    let width = terminal_size().map(|(w, _)| w.0);
    println!("entering interactive.");
    let mut buf = String::new();
    loop {
        print!("> ");
        stdout().flush()?;
        buf.clear();
        if stdin().read_line(&mut buf)? == 0 {
            break;
        }
        if buf.trim().is_empty() {
            continue;
        }
        let cmd = match command::parse_command(&buf) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match cmd {
            Command::Access(kind, addr) => {
                let outcome = sim.access(kind, addr);
                println!("{outcome}");
            }
            Command::Show { levels, at } => show(sim, levels, at),
            #[cfg(feature = "stat")]
            Command::Stat => {
                println!("{}", sim.collect_stat().view(width.unwrap_or(60) as usize));
            }
            #[cfg(not(feature = "stat"))]
            Command::Stat => {
                let stats = sim.snapshot();
                println!(
                    "{} accesses, average access time {:.4} ns",
                    stats.accesses, stats.avg_access_time_l1
                );
            }
            Command::Help => println!("{HELP}"),
            Command::Exit => break,
        }
    }
    println!("leaving interactive.");
    Ok(())
}

fn show(sim: &Simulator, levels: Level, at: Option<u64>) {
    let h = sim.hierarchy();
    if levels.contains(Level::L1) {
        show_cache("L1", h.l1(), at);
    }
    if levels.contains(Level::Victim) {
        let vc = h.victim();
        if !vc.is_enabled() {
            println!("victim cache disabled.");
        } else {
            println!("victim cache ({}/{} entries, oldest first):", vc.len(), vc.capacity());
            let masks = h.l1().masks();
            for (i, e) in vc.entries().enumerate() {
                let at_match = match at {
                    Some(a) => masks.block_address(a) == e.tag,
                    None => true,
                };
                if at_match {
                    println!(
                        "  #{i}: {}{}",
                        Addr::new(masks.block_base(e.tag)),
                        if e.dirty { " dirty" } else { "" }
                    );
                }
            }
        }
    }
    if levels.contains(Level::L2) {
        show_cache("L2", h.l2(), at);
    }
}

fn show_cache(name: &str, cache: &Cache, at: Option<u64>) {
    println!("{name} ({}, {} valid blocks):", cache.geometry(), cache.valid_blocks());
    match at {
        Some(addr) => show_set(cache, cache.decompose(addr).index, true),
        None => {
            for index in 0..cache.geometry().num_sets() {
                show_set(cache, index, false);
            }
        }
    }
}

fn show_set(cache: &Cache, index: usize, with_invalid: bool) {
    let set = cache.set(index);
    if !with_invalid && set.iter().all(|b| !b.valid) {
        return;
    }
    println!("  set {index}:");
    for (way, b) in set.iter().enumerate() {
        if b.valid {
            println!(
                "    way {way:>3}: {} tag {:#x} lru {:>3}{}",
                Addr::new(cache.masks().compose(b.tag, index)),
                b.tag,
                b.lru,
                if b.dirty { " dirty" } else { "" }
            );
        } else if with_invalid {
            println!("    way {way:>3}: invalid");
        }
    }
}
