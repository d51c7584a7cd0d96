use image::{DynamicImage, Rgb, RgbImage};
use photobooth_core::capture::{CaptureSession, StillDevice};
use photobooth_core::gemini::{Candidate, Content, GenerationRequest, GenerationResponse, Part};
use photobooth_core::scenes::{ImageFetcher, SCENES, SceneId};
use photobooth_core::workflow::{ImageGenerator, ImageHost};
use photobooth_core::{AppError, Booth, BoothState, ProcessingConfig, RasterImage, Result, Watermark};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;

fn jpeg(width: u32, height: u32, color: [u8; 3]) -> RasterImage {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    RasterImage::encode_jpeg(&DynamicImage::ImageRgb8(img), 90).unwrap()
}

fn image_response(image: &RasterImage) -> GenerationResponse {
    GenerationResponse {
        candidates: vec![Candidate {
            content: Content {
                role: Some("model".into()),
                parts: vec![Part::text("done"), Part::image(image)],
            },
        }],
    }
}

#[derive(Clone, Copy)]
enum Reply {
    Image,
    TextOnly,
    RateLimited,
    Hang,
}

struct FakeGenerator {
    reply: Mutex<Reply>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ImageGenerator for &FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = *self.reply.lock().unwrap();
        match reply {
            Reply::Image => Ok(image_response(&jpeg(90, 160, [30, 140, 60]))),
            Reply::TextOnly => Ok(GenerationResponse {
                candidates: vec![Candidate::default()],
            }),
            Reply::RateLimited => Err(AppError::RateLimited),
            Reply::Hang => std::future::pending().await,
        }
    }
}

struct FakeFetcher {
    fail: bool,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn ok() -> Self {
        Self {
            fail: false,
            urls: Mutex::new(Vec::new()),
        }
    }
}

impl ImageFetcher for &FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<RasterImage> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            Err(AppError::SceneFetchFailed(format!("{}: HTTP 404", url)))
        } else {
            Ok(jpeg(16, 16, [200, 180, 120]))
        }
    }
}

#[derive(Default)]
struct FakeHost {
    uploads: AtomicUsize,
}

impl ImageHost for &FakeHost {
    async fn publish(&self, _image: &RasterImage, api_key: &str) -> Result<String> {
        if api_key == "bad" {
            return Err(AppError::UploadFailed("Invalid API v1 key.".into()));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://i.ibb.co/{}/booth.jpg", n))
    }
}

fn booth<'a>(
    generator: &'a FakeGenerator,
    fetcher: &'a FakeFetcher,
    host: &'a FakeHost,
) -> Booth<&'a FakeGenerator, &'a FakeFetcher, &'a FakeHost> {
    Booth::new(generator, fetcher, host, Watermark::new("TEST", None))
}

fn landscape_device() -> StillDevice {
    StillDevice::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 360, Rgb([90, 90, 90]))))
}

#[tokio::test]
async fn capture_process_edit_share() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);
    assert_eq!(booth.state(), BoothState::Live);

    let mut device = landscape_device();
    {
        let mut session = CaptureSession::open(&mut device).unwrap();
        assert!(booth.capture(&mut session).unwrap());
    }
    assert!(!device.is_active());
    assert_eq!(booth.state(), BoothState::Configure);

    let config = ProcessingConfig {
        scene: SceneId::LearningResources,
        ..ProcessingConfig::default()
    };
    booth.process(&config).await.unwrap();
    assert_eq!(booth.state(), BoothState::Result);
    assert_eq!(fetcher.urls.lock().unwrap().as_slice(), &[SCENES[1].url.to_string()]);

    let result = booth.processed().unwrap().decode().unwrap();
    assert_eq!((result.width(), result.height()), (90, 160));

    booth.edit("Add a red scarf").await.unwrap();
    {
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].model, "gemini-2.5-flash-image");
        assert_eq!(requests[1].parts()[0], Part::text("Add a red scarf"));
    }

    let url = booth.share("key").await.unwrap();
    assert_eq!(booth.share("key").await.unwrap(), url);
    assert_eq!(host.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(booth.public_url(), Some(url.as_str()));
}

#[tokio::test]
async fn capture_without_frame_stays_live() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);

    let mut device = StillDevice::detached();
    let mut session = CaptureSession::open(&mut device).unwrap();
    assert!(!booth.capture(&mut session).unwrap());
    assert_eq!(booth.state(), BoothState::Live);
}

#[tokio::test]
async fn missing_image_returns_to_configure_keeping_photo() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::TextOnly), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);
    booth.load_photo(&jpeg(400, 300, [10, 20, 30])).unwrap();
    let photo = booth.captured().cloned().unwrap();

    let err = booth.process(&ProcessingConfig::default()).await.unwrap_err();
    assert!(matches!(err, AppError::NoImageInResponse));
    assert_eq!(booth.state(), BoothState::Configure);
    assert_eq!(booth.captured(), Some(&photo));
    assert_eq!(booth.last_error(), Some("No image in response"));

    // retry without recapturing
    *generator.reply.lock().unwrap() = Reply::Image;
    booth.process(&ProcessingConfig::default()).await.unwrap();
    assert_eq!(booth.state(), BoothState::Result);
    assert_eq!(booth.last_error(), None);
}

#[tokio::test]
async fn scene_fetch_failure_is_surfaced() {
    let generator = FakeGenerator::new(Reply::Image);
    let fetcher = FakeFetcher {
        fail: true,
        urls: Mutex::new(Vec::new()),
    };
    let host = FakeHost::default();
    let mut booth = booth(&generator, &fetcher, &host);
    booth.load_photo(&jpeg(300, 300, [1, 2, 3])).unwrap();

    let err = booth.process(&ProcessingConfig::default()).await.unwrap_err();
    assert!(matches!(err, AppError::SceneFetchFailed(_)));
    assert!(err.is_transient());
    assert!(generator.requests.lock().unwrap().is_empty());
    assert_eq!(booth.state(), BoothState::Configure);
}

#[tokio::test]
async fn failed_edit_keeps_previous_result() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);
    booth.load_photo(&jpeg(300, 500, [1, 2, 3])).unwrap();
    booth.process(&ProcessingConfig::default()).await.unwrap();
    let before = booth.processed().cloned().unwrap();

    *generator.reply.lock().unwrap() = Reply::RateLimited;
    assert!(matches!(booth.edit("make it night").await, Err(AppError::RateLimited)));
    assert_eq!(booth.state(), BoothState::Result);
    assert_eq!(booth.processed(), Some(&before));
    assert!(!booth.is_busy());

    assert!(matches!(booth.edit("   ").await, Err(AppError::EmptyInstruction)));
}

#[tokio::test]
async fn share_requires_key_and_reports_upstream_message() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);
    booth.load_photo(&jpeg(300, 500, [1, 2, 3])).unwrap();
    booth.process(&ProcessingConfig::default()).await.unwrap();

    assert!(matches!(booth.share("").await, Err(AppError::Config(_))));
    match booth.share("bad").await {
        Err(AppError::UploadFailed(msg)) => assert_eq!(msg, "Invalid API v1 key."),
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(booth.public_url(), None);
}

#[tokio::test]
async fn actions_outside_their_state_are_rejected() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);

    assert!(matches!(
        booth.process(&ProcessingConfig::default()).await,
        Err(AppError::InvalidState { .. })
    ));
    assert!(matches!(booth.edit("x").await, Err(AppError::InvalidState { .. })));
    assert!(matches!(booth.back_to_configure(), Err(AppError::InvalidState { .. })));

    booth.load_photo(&jpeg(300, 500, [1, 2, 3])).unwrap();
    booth.process(&ProcessingConfig::default()).await.unwrap();
    booth.back_to_configure().unwrap();
    assert_eq!(booth.state(), BoothState::Configure);
    assert!(booth.processed().is_none());
    assert!(booth.captured().is_some());

    booth.retake();
    assert_eq!(booth.state(), BoothState::Live);
    assert!(booth.preview().is_none());
}

#[tokio::test]
async fn uploaded_photo_is_portrait_and_unmirrored() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Image), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);

    let split = RgbImage::from_fn(400, 400, |x, _| if x < 200 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
    let photo = RasterImage::encode_png(&DynamicImage::ImageRgb8(split)).unwrap();
    booth.load_photo(&photo).unwrap();

    let captured = booth.captured().unwrap();
    assert_eq!(captured.mime_type(), "image/jpeg");
    let pixels = captured.decode().unwrap().to_rgb8();
    assert_eq!(pixels.dimensions(), (1080, 1920));
    assert!(pixels.get_pixel(10, 960)[0] > 200);
    assert!(pixels.get_pixel(1070, 960)[2] > 200);
}

#[tokio::test]
async fn cancelled_requests_release_the_booth() {
    let (generator, fetcher, host) = (FakeGenerator::new(Reply::Hang), FakeFetcher::ok(), FakeHost::default());
    let mut booth = booth(&generator, &fetcher, &host);
    booth.load_photo(&jpeg(300, 500, [1, 2, 3])).unwrap();
    let photo = booth.captured().cloned().unwrap();

    let cut_short = timeout(Duration::from_millis(50), booth.process(&ProcessingConfig::default())).await;
    assert!(cut_short.is_err());
    assert_eq!(booth.state(), BoothState::Configure);
    assert!(!booth.is_busy());
    assert_eq!(booth.captured(), Some(&photo));

    *generator.reply.lock().unwrap() = Reply::Image;
    booth.process(&ProcessingConfig::default()).await.unwrap();
    let before = booth.processed().cloned().unwrap();

    *generator.reply.lock().unwrap() = Reply::Hang;
    let cut_short = timeout(Duration::from_millis(50), booth.edit("make it night")).await;
    assert!(cut_short.is_err());
    assert!(!booth.is_busy());
    assert_eq!(booth.state(), BoothState::Result);
    assert_eq!(booth.processed(), Some(&before));

    booth.back_to_configure().unwrap();
    booth.load_photo(&jpeg(300, 500, [4, 5, 6])).unwrap();
    assert_eq!(booth.state(), BoothState::Configure);
}
