//! Run artifact layout under `records/`.
//!
//! Screenshots land in `records/screencaps`, screen recordings in
//! `records/screenrecords`, both relative to the run path. Filenames are
//! derived from element descriptions and case names; a repeated name
//! overwrites the earlier file, which is fine because every screenshot is
//! consumed immediately after it is written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::Rgba;
use tracing::warn;

use crate::geometry::RatioPoint;

/// Screenshot directory, relative to the run path
pub const SCREENCAP_DIR: &str = "records/screencaps";

/// Screen recording directory, relative to the run path
pub const SCREENRECORD_DIR: &str = "records/screenrecords";

/// Radius in pixels of the marker dot drawn at a located point
const MARK_RADIUS: i64 = 5;

/// Path of the screenshot for the given capture name
pub fn screenshot_path(run_path: &Path, name: &str) -> PathBuf {
    run_path.join(SCREENCAP_DIR).join(format!("{}.png", name))
}

/// Path of the screen recording for the given case
pub fn recording_path(run_path: &Path, case_name: &str) -> PathBuf {
    run_path.join(SCREENRECORD_DIR).join(format!("{}.mp4", case_name))
}

/// Remove all artifacts of previous runs.
///
/// Deletes the screenshot and recording trees entirely. This is destructive
/// and irreversible; it runs at the start of a directory-mode run so the
/// artifact set on disk always belongs to the latest run.
pub fn clear_artifacts(run_path: &Path) -> io::Result<()> {
    for dir in [SCREENCAP_DIR, SCREENRECORD_DIR] {
        let path = run_path.join(dir);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
    }
    Ok(())
}

/// Draw a red dot on a screenshot at the given relative position.
///
/// Used to mark where the locate model placed an element, so a failed run can
/// be diagnosed from the artifacts alone. Best effort: callers log and
/// continue on error.
pub fn mark_point(image_path: &Path, point: RatioPoint) -> Result<(), image::ImageError> {
    let mut img = image::open(image_path)?.into_rgba8();
    let (width, height) = (img.width(), img.height());

    let cx = (point.x * f64::from(width)).round() as i64;
    let cy = (point.y * f64::from(height)).round() as i64;

    for dy in -MARK_RADIUS..=MARK_RADIUS {
        for dx in -MARK_RADIUS..=MARK_RADIUS {
            if dx * dx + dy * dy > MARK_RADIUS * MARK_RADIUS {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                img.put_pixel(px as u32, py as u32, Rgba([255, 0, 0, 255]));
            }
        }
    }

    img.save(image_path)
}

/// Mark a located point, logging instead of failing on image errors
pub fn mark_point_best_effort(image_path: &Path, point: RatioPoint) {
    if let Err(err) = mark_point(image_path, point) {
        warn!("failed to mark located point on {}: {}", image_path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_paths() {
        let run = Path::new("/run");
        assert_eq!(
            screenshot_path(run, "login_button"),
            PathBuf::from("/run/records/screencaps/login_button.png")
        );
        assert_eq!(
            recording_path(run, "login"),
            PathBuf::from("/run/records/screenrecords/login.mp4")
        );
    }

    #[test]
    fn test_clear_artifacts_removes_both_trees() {
        let tmp = TempDir::new().unwrap();
        let caps = tmp.path().join(SCREENCAP_DIR);
        let records = tmp.path().join(SCREENRECORD_DIR);
        fs::create_dir_all(&caps).unwrap();
        fs::create_dir_all(&records).unwrap();
        fs::write(caps.join("old.png"), b"stale").unwrap();
        fs::write(records.join("old.mp4"), b"stale").unwrap();

        clear_artifacts(tmp.path()).unwrap();

        assert!(!caps.exists());
        assert!(!records.exists());
    }

    #[test]
    fn test_clear_artifacts_on_empty_run_path() {
        let tmp = TempDir::new().unwrap();
        assert!(clear_artifacts(tmp.path()).is_ok());
    }

    #[test]
    fn test_mark_point_paints_red_dot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shot.png");
        RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255])).save(&path).unwrap();

        mark_point(&path, RatioPoint::new(0.5, 0.5)).unwrap();

        let img = image::open(&path).unwrap().into_rgba8();
        assert_eq!(*img.get_pixel(50, 50), Rgba([255, 0, 0, 255]));
        // Outside the dot stays untouched
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_mark_point_near_edge_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("edge.png");
        RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255])).save(&path).unwrap();

        mark_point(&path, RatioPoint::new(0.0, 1.0)).unwrap();
    }
}
