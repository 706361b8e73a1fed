pub mod albums;
pub mod artists;
pub mod jobs;
pub mod playlist_entries;
pub mod playlists;
pub mod tracks;
pub mod user_settings;

pub use albums::Entity as Albums;
pub use artists::Entity as Artists;
pub use jobs::Entity as Jobs;
pub use playlist_entries::Entity as PlaylistEntries;
pub use playlists::Entity as Playlists;
pub use tracks::Entity as Tracks;
pub use user_settings::Entity as UserSettings;
