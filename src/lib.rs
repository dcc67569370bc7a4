pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

pub mod crypto {
    pub mod aes;
    pub mod master_key;
}

pub mod gateway {
    pub mod decode;
    pub mod proxy;
    pub mod rate_limit;
}

pub mod models {
    pub mod attendance;
    pub mod profile;
    pub mod proxy;
    pub mod session;
    pub mod sync;
    pub mod timetable;
}

pub mod portal {
    pub mod attendance;
    pub mod endpoints;
    pub mod html;
    pub mod login;
    pub mod profile;
    pub mod timetable;
}

pub mod repositories {
    pub mod attendance;
    pub mod profile;
    pub mod session;
    pub mod sync_meta;
    pub mod timetable;
}

pub mod services {
    pub mod auth;
    pub mod portal;
    pub mod sync;
}

pub mod handlers {
    pub mod auth;
    pub mod data;
    pub mod proxy;
    pub mod sync;
}

pub mod validation {
    pub mod auth;
    pub mod target;
}
