use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView};
use tokio::sync::mpsc;
use tracing::warn;

use crate::source::ImageSource;
use crate::tui::AppEvent;

/// Widest preview the UI will draw, in terminal cells.
pub const PREVIEW_COLS: u32 = 40;
/// Tallest preview, in cell rows (each row shows two pixel rows).
pub const PREVIEW_ROWS: u32 = 10;

/// A decoded image reduced to a grid of terminal cells. Each cell carries
/// the two vertically stacked pixels a `▀` half-block renders (glyph color
/// on top, background color below).
#[derive(Debug, Clone)]
pub struct Preview {
    pub cols: u16,
    pub rows: u16,
    /// Row-major `(top, bottom)` RGB pairs, `cols * rows` of them.
    pub cells: Vec<([u8; 3], [u8; 3])>,
    /// Original pixel dimensions, shown under the preview.
    pub dimensions: (u32, u32),
}

/// Outcome of a background preview load, tagged with the selection
/// generation that requested it so a superseded load can be dropped.
#[derive(Debug, Clone)]
pub enum PreviewUpdate {
    Ready { generation: u64, preview: Preview },
    Failed { generation: u64, message: String },
}

/// Fetch, decode, and downscale the selected image, reporting back through
/// the app event channel. Runs as a spawned task; failure degrades to a
/// textual note in the preview pane, never an error dialog.
pub async fn load_preview(
    source: ImageSource,
    generation: u64,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    let update = match fetch_and_decode(&source).await {
        Ok(preview) => PreviewUpdate::Ready {
            generation,
            preview,
        },
        Err(err) => {
            warn!("preview load failed: {err}");
            PreviewUpdate::Failed {
                generation,
                message: err.to_string(),
            }
        }
    };
    let _ = tx.send(AppEvent::Preview(update));
}

async fn fetch_and_decode(source: &ImageSource) -> Result<Preview> {
    let bytes = match source {
        ImageSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read image file {:?}: {}", path, e))?,
        ImageSource::Url(url) => reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec(),
    };

    let img = image::load_from_memory(&bytes)?;
    Ok(build_preview(&img, PREVIEW_COLS, PREVIEW_ROWS))
}

/// Downscale to fit the cell grid (a cell is one pixel wide and two tall)
/// and collect the half-block color pairs.
pub fn build_preview(img: &DynamicImage, max_cols: u32, max_rows: u32) -> Preview {
    let dimensions = (img.width(), img.height());

    let small = img.thumbnail(max_cols, max_rows * 2).to_rgb8();
    let cols = small.width();
    let pixel_rows = small.height();
    let rows = pixel_rows.div_ceil(2);

    let mut cells = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let top = small.get_pixel(col, row * 2).0;
            // Odd-height images repeat the last pixel row
            let bottom_y = (row * 2 + 1).min(pixel_rows - 1);
            let bottom = small.get_pixel(col, bottom_y).0;
            cells.push((top, bottom));
        }
    }

    Preview {
        cols: cols as u16,
        rows: rows as u16,
        cells,
        dimensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_small_image_keeps_pixels() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(1, 1, Rgb([255, 255, 255]));

        let preview = build_preview(&DynamicImage::ImageRgb8(img), PREVIEW_COLS, PREVIEW_ROWS);
        assert_eq!((preview.cols, preview.rows), (2, 1));
        assert_eq!(preview.dimensions, (2, 2));
        assert_eq!(preview.cells[0], ([255, 0, 0], [0, 0, 255]));
        assert_eq!(preview.cells[1], ([0, 255, 0], [255, 255, 255]));
    }

    #[test]
    fn test_odd_height_repeats_last_row() {
        let mut img = RgbImage::new(1, 3);
        img.put_pixel(0, 0, Rgb([10, 10, 10]));
        img.put_pixel(0, 1, Rgb([20, 20, 20]));
        img.put_pixel(0, 2, Rgb([30, 30, 30]));

        let preview = build_preview(&DynamicImage::ImageRgb8(img), PREVIEW_COLS, PREVIEW_ROWS);
        assert_eq!((preview.cols, preview.rows), (1, 2));
        assert_eq!(preview.cells[1], ([30, 30, 30], [30, 30, 30]));
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let img = RgbImage::from_pixel(400, 300, Rgb([7, 7, 7]));
        let preview = build_preview(&DynamicImage::ImageRgb8(img), PREVIEW_COLS, PREVIEW_ROWS);
        assert!(preview.cols as u32 <= PREVIEW_COLS);
        assert!(preview.rows as u32 <= PREVIEW_ROWS);
        assert_eq!(preview.dimensions, (400, 300));
    }
}
