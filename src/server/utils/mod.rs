pub mod packer_utils;
pub mod playlist_utils;
pub mod token_utils;
pub mod unbaser_utils;
pub mod variant_utils;
