pub mod bot_detection;
