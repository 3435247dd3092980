use serde::Deserialize;

/// How an image is sized against the viewport in fullscreen mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Whole image visible, bars on the non-matching axis.
    #[default]
    Letterbox,
    /// Target completely covered, overflow cropped.
    Cover,
}

impl FitMode {
    pub fn letterbox(self) -> bool {
        matches!(self, Self::Letterbox)
    }
}

/// Placement of a scaled image inside a target box, in whole pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitRect {
    pub width: i64,
    pub height: i64,
    pub left: i64,
    pub top: i64,
    /// `true` when the width was matched to the target width.
    pub scaled_to_width: bool,
}

/// Scales `src` into `target` preserving aspect ratio and centers it.
///
/// With `letterbox` the whole image stays visible; without it the target is
/// covered and the overflowing axis gets a negative offset. Any non-positive
/// dimension yields an all-zero rectangle.
pub fn fit(src_w: i64, src_h: i64, target_w: i64, target_h: i64, letterbox: bool) -> FitRect {
    if src_w <= 0 || src_h <= 0 || target_w <= 0 || target_h <= 0 {
        return FitRect::default();
    }

    let (sw, sh) = (src_w as f64, src_h as f64);
    let (tw, th) = (target_w as f64, target_h as f64);

    // width-matched candidate
    let (w1, h1) = (tw, sh * tw / sw);
    // height-matched candidate
    let (w2, h2) = (sw * th / sh, th);

    let scaled_to_width = (w2 > tw) == letterbox;
    let (w, h) = if scaled_to_width { (w1, h1) } else { (w2, h2) };
    let width = w.floor() as i64;
    let height = h.floor() as i64;

    FitRect {
        width,
        height,
        left: (target_w - width).div_euclid(2),
        top: (target_h - height).div_euclid(2),
        scaled_to_width,
    }
}
