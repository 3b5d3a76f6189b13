pub mod capture {
    pub mod capture_controller;
    pub mod domain {
        pub mod capture_output;
        pub mod dwell_accumulator;
        pub mod session_state;
    }
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_classifier;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod capture_session_use_case;
    pub mod session_logger;
}

pub mod rendering {
    pub mod domain {
        pub mod drawing_surface;
        pub mod progress_ring_renderer;
        pub mod target_zone;
    }
    pub mod infrastructure;
}

pub mod shared {
    pub mod capture_config;
    pub mod clock;
    pub mod constants;
    pub mod frame;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod image_encoder;
        pub mod image_writer;
        pub mod video_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod image_file_writer;
        pub mod jpeg_encoder;
    }
}
