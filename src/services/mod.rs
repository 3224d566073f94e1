pub mod etd_api;
