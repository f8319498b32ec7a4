//! Structure-aware merging of generated declarations into existing source.
//!
//! An existing artifact is scanned into a lightweight structural form (use
//! lines, struct names, impl blocks, fn declarations with their parameter
//! types). Only declarations the generator owns are inserted; every byte the
//! scan does not touch is carried over unchanged. The ownership match key is
//! (fn name, canonical parameter-type list, `self` excluded): a member whose
//! name matches a required member but whose parameter types differ is a
//! conflict, never a silent replacement.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FN_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\("
    )
    .unwrap();
    static ref USE_RE: Regex = Regex::new(r"(?m)^use\s+.+?;[ \t]*$").unwrap();
}

/// A declaration the generator owns and requires to exist.
#[derive(Debug, Clone)]
pub struct RequiredMember {
    pub name:        String,
    /// Canonical parameter types (whitespace stripped, `self` excluded).
    pub param_types: Vec<String>,
    /// Fully rendered declaration, indented for its insertion site, without a
    /// trailing newline.
    pub text:        String,
}

#[derive(Debug, Clone)]
pub struct ImplPlan {
    pub trait_name: String,
    pub type_name:  String,
    pub members:    Vec<RequiredMember>,
}

/// Everything the generator requires of one artifact.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    /// Leading doc lines, used only when scaffolding the file from scratch.
    pub header:       String,
    /// Exact `use ...;` lines the artifact needs.
    pub uses:         Vec<String>,
    /// (type name, rendered declaration), inserted when the type is absent.
    pub struct_decl:  Option<(String, String)>,
    pub impl_block:   Option<ImplPlan>,
    /// Top-level members (test scaffolding), appended at end of file.
    pub free_members: Vec<RequiredMember>,
}

#[derive(Debug, PartialEq)]
pub enum MergeOutcome {
    /// The artifact already satisfies the plan; nothing to write.
    Unchanged,
    /// New content with the required declarations spliced in.
    Updated(String),
}

/// A required member collided with an existing member of the same name but an
/// incompatible signature. The caller maps this onto `SignatureConflict`.
#[derive(Debug)]
pub struct MergeConflict {
    pub member: String,
}

/// Canonical form of a parameter type for signature comparison: every
/// whitespace character removed.
pub fn canonical(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Render a fresh artifact for a plan, used when the target file is absent.
pub fn render_fresh(plan: &MergePlan) -> String {
    let mut out = String::new();
    if !plan.header.is_empty() {
        out.push_str(&plan.header);
        out.push('\n');
    }
    if !plan.uses.is_empty() {
        out.push('\n');
        for line in &plan.uses {
            out.push_str(line);
            out.push('\n');
        }
    }
    if let Some((_, decl)) = &plan.struct_decl {
        out.push('\n');
        out.push_str(decl);
        out.push('\n');
    }
    if let Some(impl_plan) = &plan.impl_block {
        out.push('\n');
        out.push_str(&render_impl(impl_plan));
        out.push('\n');
    }
    for member in &plan.free_members {
        out.push('\n');
        out.push_str(&member.text);
        out.push('\n');
    }
    out
}

/// Merge the plan into existing source text. Only generator-owned
/// declarations are inserted; all other text is preserved byte for byte.
pub fn merge_source(existing: &str, plan: &MergePlan) -> Result<MergeOutcome, MergeConflict> {
    let mask = mask_source(existing);
    let fns = scan_fns(existing, &mask);

    // (position, text) insertions, applied back to front
    let mut edits: Vec<(usize, String)> = Vec::new();

    for line in &plan.uses {
        if !has_line(existing, line) {
            edits.push((use_insert_pos(existing, &mask), format!("{}\n", line)));
        }
    }

    if let Some(impl_plan) = &plan.impl_block {
        match find_impl_block(existing, &mask, &impl_plan.trait_name, &impl_plan.type_name) {
            Some((open, close)) => {
                let inner_depth = depth_at(&mask, open) + 1;
                for member in &impl_plan.members {
                    match find_member(&fns, &member.name, open, close, inner_depth) {
                        Some(existing_fn) => {
                            if existing_fn.param_types != member.param_types {
                                return Err(MergeConflict {
                                    member: member.name.clone(),
                                });
                            }
                        }
                        None => edits.push((close, format!("\n{}\n", member.text))),
                    }
                }
            }
            None => {
                // No impl block at all: append a complete one (and the struct
                // declaration when the type is missing too).
                let mut appended = String::new();
                if let Some((type_name, decl)) = &plan.struct_decl {
                    if !has_struct(&mask, existing, type_name) {
                        appended.push_str("\n");
                        appended.push_str(decl);
                        appended.push('\n');
                    }
                }
                appended.push('\n');
                appended.push_str(&render_impl(impl_plan));
                appended.push('\n');
                edits.push((existing.len(), appended));
            }
        }
    }

    for member in &plan.free_members {
        match find_member(&fns, &member.name, 0, existing.len(), 0) {
            Some(existing_fn) => {
                if existing_fn.param_types != member.param_types {
                    return Err(MergeConflict {
                        member: member.name.clone(),
                    });
                }
            }
            None => edits.push((existing.len(), format!("\n{}\n", member.text))),
        }
    }

    if edits.is_empty() {
        return Ok(MergeOutcome::Unchanged);
    }

    // Apply back to front so earlier offsets stay valid; edits sharing an
    // offset are applied in reverse plan order, which keeps them in plan
    // order in the output.
    let mut ordered: Vec<(usize, usize, String)> = edits
        .into_iter()
        .enumerate()
        .map(|(seq, (pos, text))| (pos, seq, text))
        .collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    let mut merged = existing.to_string();
    for (pos, _, text) in ordered {
        merged.insert_str(pos, &text);
    }
    Ok(MergeOutcome::Updated(merged))
}

fn render_impl(plan: &ImplPlan) -> String {
    let mut out = format!("impl {} for {} {{\n", plan.trait_name, plan.type_name);
    for (i, member) in plan.members.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&member.text);
        out.push('\n');
    }
    out.push('}');
    out
}

#[derive(Debug)]
struct FnDecl {
    name:        String,
    param_types: Vec<String>,
    /// Byte offset of the `fn` keyword's line start.
    start:       usize,
    /// Brace depth at the declaration.
    depth:       usize,
}

/// Replace comments and string/char literals with spaces so that regex and
/// brace matching never trip over braces inside them. Offsets are preserved:
/// the mask has exactly the same length as the input.
fn mask_source(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut mask: Vec<u8> = bytes.to_vec();
    let mut i = 0;

    let blank = |mask: &mut Vec<u8>, from: usize, to: usize| {
        for b in &mut mask[from..to] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    };

    while i < bytes.len() {
        match bytes[i] {
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                blank(&mut mask, start, i);
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                let start = i;
                let mut nesting = 1;
                i += 2;
                while i < bytes.len() && nesting > 0 {
                    if i + 1 < bytes.len() && bytes[i] == b'/' && bytes[i + 1] == b'*' {
                        nesting += 1;
                        i += 2;
                    } else if i + 1 < bytes.len() && bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        nesting -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                blank(&mut mask, start, i);
            }
            b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        i += 2;
                    } else if bytes[i] == b'"' {
                        i += 1;
                        break;
                    } else {
                        i += 1;
                    }
                }
                let end = i.min(bytes.len());
                blank(&mut mask, start, end);
            }
            b'r' if i + 1 < bytes.len() && (bytes[i + 1] == b'"' || bytes[i + 1] == b'#') => {
                // Raw string: r"..." or r#"..."# with any number of hashes.
                let start = i;
                let mut j = i + 1;
                let mut hashes = 0;
                while j < bytes.len() && bytes[j] == b'#' {
                    hashes += 1;
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'"' {
                    j += 1;
                    'raw: while j < bytes.len() {
                        if bytes[j] == b'"' {
                            let mut k = 0;
                            while k < hashes && j + 1 + k < bytes.len() && bytes[j + 1 + k] == b'#' {
                                k += 1;
                            }
                            if k == hashes {
                                j += 1 + hashes;
                                break 'raw;
                            }
                        }
                        j += 1;
                    }
                    blank(&mut mask, start, j.min(bytes.len()));
                    i = j;
                    continue;
                }
                i += 1;
                continue;
            }
            b'\'' => {
                // Distinguish char literals from lifetimes: a literal closes
                // within a few bytes, a lifetime never has a closing quote.
                let mut j = i + 1;
                if j < bytes.len() && bytes[j] == b'\\' {
                    j += 2;
                    while j < bytes.len() && bytes[j] != b'\'' {
                        j += 1;
                    }
                    if j < bytes.len() {
                        blank(&mut mask, i, j + 1);
                        i = j + 1;
                        continue;
                    }
                } else if j + 1 < bytes.len() && bytes[j + 1] == b'\'' {
                    blank(&mut mask, i, j + 2);
                    i = j + 2;
                    continue;
                }
                i += 1;
                continue;
            }
            _ => {
                i += 1;
            }
        }
    }

    // The mask only ever replaces bytes with ASCII spaces, so it stays valid
    // UTF-8 except where a multi-byte char was partially blanked; blank those
    // leftovers too.
    let mut masked = mask;
    for b in &mut masked {
        if *b >= 0x80 {
            *b = b' ';
        }
    }
    String::from_utf8(masked).unwrap_or_else(|_| " ".repeat(text.len()))
}

fn depth_at(mask: &str, pos: usize) -> usize {
    let mut depth = 0usize;
    for b in mask.as_bytes()[..pos].iter() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

fn scan_fns(text: &str, mask: &str) -> Vec<FnDecl> {
    let mut fns = Vec::new();
    for caps in FN_RE.captures_iter(mask) {
        let whole = caps.get(0).unwrap();
        let name = caps.get(1).unwrap().as_str().to_string();
        let open_paren = whole.end() - 1;
        if let Some(close_paren) = match_delim(mask, open_paren, b'(', b')') {
            let params = &text[open_paren + 1..close_paren];
            let masked_params = &mask[open_paren + 1..close_paren];
            fns.push(FnDecl {
                name,
                param_types: parse_param_types(params, masked_params),
                start: whole.start(),
                depth: depth_at(mask, whole.start()),
            });
        }
    }
    fns
}

/// Find the matching closing delimiter for the one at `open`.
fn match_delim(mask: &str, open: usize, open_byte: u8, close_byte: u8) -> Option<usize> {
    let bytes = mask.as_bytes();
    let mut nesting = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == open_byte {
            nesting += 1;
        } else if b == close_byte {
            nesting -= 1;
            if nesting == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split a parameter list on top-level commas and keep the canonical type of
/// each parameter, dropping the pattern before the `:` and any `self` form.
fn parse_param_types(params: &str, masked_params: &str) -> Vec<String> {
    let bytes = masked_params.as_bytes();
    let mut depth = 0i32;
    let mut piece_start = 0usize;
    let mut pieces = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'<' => depth += 1,
            b')' | b']' | b'>' => depth -= 1,
            b',' if depth == 0 => {
                pieces.push(&params[piece_start..i]);
                piece_start = i + 1;
            }
            _ => {}
        }
    }
    if piece_start < params.len() {
        pieces.push(&params[piece_start..]);
    }

    let mut types = Vec::new();
    for piece in pieces {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let flat = canonical(trimmed);
        if flat == "self" || flat == "&self" || flat == "&mutself" || flat == "mutself" {
            continue;
        }
        // "name: Type" -> "Type"; a piece without a top-level colon (fn
        // pointer sugar etc.) is kept whole.
        let ty = match top_level_colon(piece) {
            Some(colon) => &piece[colon + 1..],
            None => piece,
        };
        types.push(canonical(ty));
    }
    types
}

/// Position of the first `:` at angle/paren depth zero that is not part of a
/// `::` path separator.
fn top_level_colon(piece: &str) -> Option<usize> {
    let bytes = piece.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'<' => depth += 1,
            b')' | b']' | b'>' => depth -= 1,
            b':' if depth == 0 => {
                if i + 1 < bytes.len() && bytes[i + 1] == b':' {
                    i += 2;
                    continue;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn find_impl_block(
    text: &str,
    mask: &str,
    trait_name: &str,
    type_name: &str,
) -> Option<(usize, usize)> {
    let re = Regex::new(&format!(
        r"impl\s+{}\s+for\s+{}\s*\{{",
        regex::escape(trait_name),
        regex::escape(type_name)
    ))
    .ok()?;
    let m = re.find(mask)?;
    let open = m.end() - 1;
    let close = match_delim(mask, open, b'{', b'}')?;
    debug_assert!(close <= text.len());
    Some((open, close))
}

fn find_member<'a>(
    fns: &'a [FnDecl],
    name: &str,
    from: usize,
    to: usize,
    depth: usize,
) -> Option<&'a FnDecl> {
    fns.iter()
        .find(|f| f.name == name && f.start >= from && f.start < to && f.depth == depth)
}

fn has_line(text: &str, line: &str) -> bool {
    text.lines().any(|l| l.trim() == line.trim())
}

fn has_struct(mask: &str, _text: &str, type_name: &str) -> bool {
    Regex::new(&format!(r"\bstruct\s+{}\b", regex::escape(type_name)))
        .map(|re| re.is_match(mask))
        .unwrap_or(false)
}

/// Insertion point for new `use` lines: after the last existing top-level
/// `use`, otherwise after any leading `//!` doc block, otherwise offset 0.
fn use_insert_pos(text: &str, mask: &str) -> usize {
    if let Some(m) = USE_RE.find_iter(mask).last() {
        let mut end = m.end();
        if text.as_bytes().get(end) == Some(&b'\n') {
            end += 1;
        }
        return end;
    }

    let mut pos = 0;
    let mut seen_docs = false;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("//!") || (seen_docs && line.trim().is_empty()) {
            seen_docs = line.trim_start().starts_with("//!") || seen_docs;
            pos += line.len();
            if line.trim().is_empty() {
                break;
            }
        } else {
            break;
        }
    }
    pos
}
