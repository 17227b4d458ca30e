//! Part name helpers for OPC packages

/// Name of the relationships part belonging to `part`
/// (`xl/cellimages.xml` -> `xl/_rels/cellimages.xml.rels`).
pub fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship `Target` against the part that owns the relationship.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    // Part names never carry a fragment.
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Relative `Target` that points from `source_part` to `target_part`
/// (`xl/drawings/drawing1.xml`, `xl/media/image1.png` -> `../media/image1.png`).
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let target: Vec<&str> = target_part.split('/').collect();

    let common = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = Vec::new();
    out.extend(std::iter::repeat("..").take(source_dir.len() - common));
    out.extend(&target[common..]);
    out.join("/")
}

/// File extension of a part name, lowercased
pub fn extension(part: &str) -> Option<String> {
    let file_name = part.rsplit('/').next().unwrap_or(part);
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
