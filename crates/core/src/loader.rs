//! Parses program description files into ready-to-run PCBs (§4.4, §6).

use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::warn;

use crate::error::{SimError, SimResult};
use crate::memory::physical::FRAME_SIZE;
use crate::memory::{PageTable, PhysicalMemory, PteFlags};
use crate::pcb::{MemoryMap, Pcb, Pid};

/// Parsed header plus section words, before any memory has been touched.
struct ProgramImage {
    text_addr: u32,
    text_words: Vec<u32>,
    data_addr: Option<u32>,
    data_words: Vec<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Text,
    Data,
}

/// Parse the `.text`/`.data` directive format described in spec §6.
///
/// Every hex-word line belongs to whichever `.text`/`.data` directive most
/// recently preceded it; `.text` is mandatory, `.data` is optional.
fn parse_program(path: &Path, source: &str) -> SimResult<ProgramImage> {
    let parse_err = |reason: String| SimError::ProgramParse {
        path: path.display().to_string(),
        reason,
    };

    let mut text_addr = None;
    let mut text_words = Vec::new();
    let mut data_addr = None;
    let mut data_words = Vec::new();
    let mut section = Section::None;

    for raw_line in source.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix(".text") {
            text_addr = Some(
                parse_hex(rest.trim()).map_err(|e| parse_err(format!(".text directive: {e}")))?,
            );
            section = Section::Text;
            continue;
        }
        if let Some(rest) = line.strip_prefix(".data") {
            data_addr = Some(
                parse_hex(rest.trim()).map_err(|e| parse_err(format!(".data directive: {e}")))?,
            );
            section = Section::Data;
            continue;
        }
        let word = parse_hex(line).map_err(|e| parse_err(format!("bad data word: {e}")))?;
        match section {
            Section::Text => text_words.push(word),
            Section::Data => data_words.push(word),
            Section::None => {
                return Err(parse_err("data word before any section directive".to_string()))
            }
        }
    }

    let text_addr = text_addr.ok_or_else(|| parse_err("missing .text section".to_string()))?;

    Ok(ProgramImage {
        text_addr,
        text_words,
        data_addr,
        data_words,
    })
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let s = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).map_err(|e| e.to_string())
}

/// Heuristic initial TTL when a program file doesn't specify one: `clamp(3 *
/// code_words, 10, 100)` (§4.4).
fn heuristic_ttl(code_words: usize) -> u32 {
    (3 * code_words as u32).clamp(10, 100)
}

/// Load one program file into a freshly populated PCB.
///
/// On any failure all frames allocated for this PCB so far are released
/// before the error is returned (§4.4's "frame exhaustion mid-load" rule).
pub fn load_program(
    physical: &mut PhysicalMemory,
    pid: Pid,
    path: &Path,
    rng: &mut impl Rng,
) -> SimResult<Pcb> {
    let source = fs::read_to_string(path).map_err(|e| SimError::ProgramParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_program_from_source(physical, pid, path, &source, rng)
}

fn load_program_from_source(
    physical: &mut PhysicalMemory,
    pid: Pid,
    path: &Path,
    source: &str,
    rng: &mut impl Rng,
) -> SimResult<Pcb> {
    let image = parse_program(path, source)?;

    let code_end = image.text_addr + image.text_words.len() as u32 * 4;
    let data_start = image.data_addr.unwrap_or(code_end);
    let data_end = data_start + image.data_words.len() as u32 * 4;
    let span_start = image.text_addr.min(data_start);
    let span_end = code_end.max(data_end).max(span_start);
    let total_pages = (span_end - span_start).div_ceil(FRAME_SIZE).max(1);

    let mut page_table = PageTable::allocate(physical, total_pages)?;
    let mut allocated_frames = Vec::new();

    for vpn in 0..total_pages {
        match physical.allocate_frame() {
            Ok(frame) => {
                allocated_frames.push(frame);
                page_table
                    .map_page(vpn, frame, PteFlags::RW | PteFlags::USER)
                    .expect("vpn within allocated range");
            }
            Err(err) => {
                for frame in allocated_frames {
                    let _ = physical.release_frame(frame);
                }
                return Err(err);
            }
        }
    }

    copy_section(physical, &page_table, span_start, image.text_addr, &image.text_words);
    if let Some(data_addr) = image.data_addr {
        copy_section(physical, &page_table, span_start, data_addr, &image.data_words);
    }

    let priority = rng.gen_range(-20..=19);
    let initial_ttl = heuristic_ttl(image.text_words.len());

    let mut pcb = Pcb::new(pid, priority, initial_ttl);
    pcb.memory_map = Some(MemoryMap {
        code_vaddr: image.text_addr,
        data_vaddr: data_start,
    });
    pcb.page_table = Some(page_table);

    Ok(pcb)
}

fn copy_section(
    physical: &mut PhysicalMemory,
    page_table: &PageTable,
    span_start: u32,
    section_addr: u32,
    words: &[u32],
) {
    for (i, word) in words.iter().enumerate() {
        let vaddr = section_addr + (i as u32) * 4;
        let vpn = (vaddr - span_start) / FRAME_SIZE;
        let offset = (vaddr - span_start) % FRAME_SIZE;
        if let Some(entry) = page_table.entry(vpn) {
            let phys_addr = (entry.frame() << 12) | offset;
            let _ = physical.write_word(phys_addr, *word);
        }
    }
}

/// Load every `*.elf` program description under `dir`, skipping (not
/// aborting on) files that fail to parse. Backs the orchestrator's
/// "programs directory" configuration option (§6).
pub fn load_dir(
    physical: &mut PhysicalMemory,
    next_pid: &mut impl FnMut() -> Pid,
    dir: &Path,
    rng: &mut impl Rng,
) -> SimResult<Vec<Pcb>> {
    let mut loaded = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| SimError::ProgramParse {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("elf") {
            continue;
        }
        let pid = next_pid();
        match load_program(physical, pid, &path, rng) {
            Ok(pcb) => loaded.push(pcb),
            Err(err) => warn!(path = %path.display(), "{err}"),
        }
    }

    Ok(loaded)
}
