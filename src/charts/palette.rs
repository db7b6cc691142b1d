//! Region color palette shared by the egui preview, Plotly maps and PNG frames.

/// Color palette for regions
pub const PALETTE: [(u8, u8, u8); 10] = [
    (52, 152, 219),  // Blue
    (231, 76, 60),   // Red
    (46, 204, 113),  // Green
    (155, 89, 182),  // Purple
    (243, 156, 18),  // Orange
    (26, 188, 156),  // Teal
    (233, 30, 99),   // Pink
    (0, 188, 212),   // Cyan
    (121, 85, 72),   // Brown
    (96, 125, 139),  // Blue Grey
];

/// Palette entry for the region at `index` in first-seen order.
pub fn region_rgb(index: usize) -> (u8, u8, u8) {
    PALETTE[index % PALETTE.len()]
}

/// CSS hex color for the region at `index`.
pub fn region_hex(index: usize) -> String {
    let (r, g, b) = region_rgb(index);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}
