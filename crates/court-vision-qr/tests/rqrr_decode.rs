use approx::assert_abs_diff_eq;
use court_vision_core::GrayImage;
use court_vision_qr::{QrDecoder, RqrrDecoder};

const MODULE_PX: usize = 6;
const QUIET_MODULES: usize = 4;

/// Render `payload` as a black-on-white code with a 4-module quiet zone.
fn render(payload: &str) -> (GrayImage, usize) {
    let code = qrcode::QrCode::new(payload.as_bytes()).expect("encodable payload");
    let modules = code.width();
    let side = (modules + 2 * QUIET_MODULES) * MODULE_PX;
    let mut data = vec![255u8; side * side];
    for (i, color) in code.to_colors().iter().enumerate() {
        if !matches!(color, qrcode::Color::Dark) {
            continue;
        }
        let x0 = (i % modules + QUIET_MODULES) * MODULE_PX;
        let y0 = (i / modules + QUIET_MODULES) * MODULE_PX;
        for y in y0..y0 + MODULE_PX {
            data[y * side + x0..y * side + x0 + MODULE_PX].fill(0);
        }
    }
    let img = GrayImage::from_raw(side, side, data).expect("image");
    (img, modules)
}

fn rotate_180(img: &GrayImage) -> GrayImage {
    let mut data = img.data.clone();
    data.reverse();
    GrayImage::from_raw(img.width, img.height, data).expect("image")
}

#[test]
fn decodes_upright_code_with_corners_in_reading_order() {
    let (img, modules) = render("left");
    let code = RqrrDecoder::default()
        .decode(&img.view())
        .expect("code decoded");
    assert_eq!(code.payload, "left");

    let q = code.corners;
    assert!(q.top_left.x < q.top_right.x);
    assert!(q.top_left.y < q.bottom_left.y);
    assert!(q.bottom_right.x > q.bottom_left.x);
    assert!(q.bottom_right.y > q.top_right.y);

    let center = (img.width / 2) as f32;
    let tol = 1.5 * MODULE_PX as f32;
    assert_abs_diff_eq!(q.center().x, center, epsilon = tol);
    assert_abs_diff_eq!(q.center().y, center, epsilon = tol);
    assert_abs_diff_eq!(q.width(), (modules * MODULE_PX) as f32, epsilon = 2.0 * tol);
}

#[test]
fn rotated_code_keeps_corners_attached_to_the_code() {
    let (img, _) = render("left");
    let code = RqrrDecoder::default()
        .decode(&rotate_180(&img).view())
        .expect("code decoded");
    assert_eq!(code.payload, "left");

    // Upside down: the code's top-left sits at the bottom-right of the image.
    let q = code.corners;
    assert!(q.top_left.x > q.top_right.x);
    assert!(q.top_left.y > q.bottom_left.y);
    assert!(q.bottom_right.x < q.bottom_left.x);
    assert!(q.bottom_right.y < q.top_right.y);
    assert!(q.top_left.x > (img.width / 2) as f32);
    assert!(q.top_left.y > (img.height / 2) as f32);
}

#[test]
fn decodes_full_experience_url() {
    let url =
        "https://helgihreinnh.github.io/copenhagen-court-vision/ar-experience.html?marker=right";
    let (img, _) = render(url);
    let code = RqrrDecoder::default()
        .decode(&img.view())
        .expect("code decoded");
    assert_eq!(code.payload, url);
}
