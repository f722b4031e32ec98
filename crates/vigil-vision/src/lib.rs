//! Embedding provider seam (C1), enrollment coordinator (C4), recognition
//! engine (C5), and attendance gate (C6).

pub mod attendance;
pub mod detector;
pub mod enroll;
pub mod error;
pub mod recognize;

pub use attendance::{AttendanceGate, AttendanceResult};
pub use detector::{DetectedFace, FaceDetector, MockFaceDetector, SharedFaceDetector};
pub use enroll::EnrollmentCoordinator;
pub use error::{Result, VisionError};
pub use recognize::{RecognitionEngine, SingleRecognition};
