pub mod embeds;
pub mod menus;
