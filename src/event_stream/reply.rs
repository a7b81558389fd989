use crate::xkcd::ComicPost;

pub const NOT_FOUND: &str = "Sorry, I could not find the requested XKCD!";

pub fn comic(post: &ComicPost) -> String {
    if post.alt.is_empty() {
        format!("Title: {}\nImage: {}", post.safe_title, post.img)
    } else {
        format!("Title: {}\nAlt Text: {}\nImage: {}", post.safe_title, post.alt, post.img)
    }
}

pub fn parse_error(token: &str) -> String {
    format!("Could not parse post number: {}", token)
}

pub fn started(username: &str) -> String {
    format!("bot {} has **started** running", username)
}

pub fn stopped(username: &str) -> String {
    format!("bot {} has **stopped** running", username)
}
