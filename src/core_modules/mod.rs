pub mod audio_sink;
pub mod blob_extractor;
pub mod coordinate_mapper;
pub mod frame;
pub mod frame_source;
pub mod motion_detector;
pub mod timeline_mixer;
pub mod tone_synthesizer;
