use crate::db::core::{BoardDB, Connection, Side};
use crate::db::footprint::Catalog;
use crate::geom::coord::GridPos;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

const MARGIN: u32 = 1;

/// Renders the board to a PNG: holes, component bodies, pins, wires and
/// bridges. `cell_px` is the hole pitch in pixels.
pub fn draw_board<C: Catalog + ?Sized>(db: &BoardDB, catalog: &C, filename: &str, cell_px: u32) {
    let pitch = cell_px.max(4);
    let width = (db.width.max(1) as u32 + 2 * MARGIN) * pitch;
    let height = (db.height.max(1) as u32 + 2 * MARGIN) * pitch;
    let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));

    let center = |p: GridPos| {
        (
            ((p.col as u32 + MARGIN) * pitch + pitch / 2) as f32,
            ((p.row as u32 + MARGIN) * pitch + pitch / 2) as f32,
        )
    };

    let hole_color = Rgb([70, 70, 60]);
    for cell in db.bounds().cells() {
        let (x, y) = center(cell);
        draw_filled_rect_mut(&mut img, ImageRect::at(x as i32 - 1, y as i32 - 1).of_size(2, 2), hole_color);
    }

    let body_color = Rgb([60, 90, 140]);
    for comp in &db.components {
        let Some(placement) = comp.placement else {
            continue;
        };
        let Some(fp) = catalog.footprint(&comp.footprint) else {
            log::warn!("No footprint '{}' for {}; not drawn", comp.footprint, comp.name);
            continue;
        };
        let body = fp.body_rect(&placement);
        let (x0, y0) = center(body.min);
        let inset = (pitch / 4) as i32;
        let rect = ImageRect::at(x0 as i32 - inset, y0 as i32 - inset)
            .of_size(body.width() as u32 * pitch - pitch + 2 * inset as u32, body.height() as u32 * pitch - pitch + 2 * inset as u32);
        draw_filled_rect_mut(&mut img, rect, body_color);
    }

    let top_color = Rgb([220, 60, 60]);
    let bottom_color = Rgb([60, 180, 220]);
    let bridge_color = Rgb([230, 200, 60]);
    for conn in &db.connections {
        let color = match (conn, conn.side()) {
            (Connection::Bridge(_), _) => bridge_color,
            (_, Side::Top) => top_color,
            (_, Side::Bottom) => bottom_color,
        };
        for seg in conn.segments() {
            let (x1, y1) = center(seg.p1);
            let (x2, y2) = center(seg.p2);
            draw_line_segment_mut(&mut img, (x1, y1), (x2, y2), color);
            if conn.is_bridge() {
                // Bridges are drawn thicker so they stand out from wires.
                draw_line_segment_mut(&mut img, (x1 + 1.0, y1 + 1.0), (x2 + 1.0, y2 + 1.0), color);
            }
        }
    }

    let pin_color = Rgb([255, 255, 255]);
    let size = (pitch / 3).max(2);
    for comp in &db.components {
        let Ok(pins) = db.pin_positions(comp.id, catalog) else {
            continue;
        };
        for (_, pos) in pins {
            let (x, y) = center(pos);
            let half = (size / 2) as i32;
            draw_filled_rect_mut(&mut img, ImageRect::at(x as i32 - half, y as i32 - half).of_size(size, size), pin_color);
        }
    }

    let label_color = Rgb([120, 220, 120]);
    for label in &db.labels {
        let (x, y) = center(label.at);
        draw_filled_rect_mut(&mut img, ImageRect::at(x as i32, y as i32 - 2).of_size(size, size), label_color);
    }

    if let Err(e) = img.save(Path::new(filename)) {
        log::warn!("Could not write {}: {}", filename, e);
    }
}
