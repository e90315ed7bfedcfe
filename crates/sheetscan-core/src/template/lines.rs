//! Separator lines marked by hand over a sample image.

/// Check manually marked separators against the image size.
///
/// Both axes need at least one line, every line must fall inside the image,
/// and none may sit on the border (borders are implicit).
pub fn validate_grid_lines(
    vertical: &[u32],
    horizontal: &[u32],
    width: u32,
    height: u32,
) -> Result<(), String> {
    if vertical.is_empty() || horizontal.is_empty() {
        return Err("at least one vertical and one horizontal line are required".to_string());
    }

    check_axis("vertical", vertical, width)?;
    check_axis("horizontal", horizontal, height)
}

fn check_axis(axis: &str, lines: &[u32], extent: u32) -> Result<(), String> {
    for &line in lines {
        if line >= extent {
            return Err(format!("{} line {} is outside the image (size {})", axis, line, extent));
        }
        if line == 0 || line + 1 == extent {
            return Err(format!("{} line {} lies on the image border", axis, line));
        }
    }
    Ok(())
}

/// Sorted, deduplicated separators with both borders added.
pub(crate) fn with_borders(lines: &[u32], extent: u32) -> Vec<u32> {
    let mut coords = Vec::with_capacity(lines.len() + 2);
    coords.push(0);
    coords.extend_from_slice(lines);
    coords.push(extent);
    coords.sort_unstable();
    coords.dedup();
    coords
}
