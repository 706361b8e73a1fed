pub mod cache;
pub mod lastfm;
pub mod matching;
pub mod openai;
pub mod plex;
pub mod spotify;
pub mod youtube;

pub use cache::CacheService;
pub use lastfm::{LastfmService, SimilarTrack};
pub use openai::{OpenAiService, SuggestedTrack};
pub use plex::{PlexService, PlexTrack};
pub use spotify::{
    SpotifyService, SpotifyArtist, SpotifyPlaylist, SpotifyPlaylistTrack, SpotifyTrack,
};
pub use youtube::{YoutubeService, YoutubeVideo};
