use crate::repl::CommandError;
use snapgram_common::model::{
    Id,
    auth::{Credentials, NewUser},
    post::PostMarker,
};
use std::{path::PathBuf, str::FromStr};

pub const HELP: &str = "\
signup <name> <username> <email> <password>
signin <email> <password>
signout
whoami
post <caption> [| <tags> [| <location> [| <image path>]]]
edit <post id> [<caption> [| <tags> [| <location> [| <image path>]]]]
delete <post id>
like <post id>
save <post id>
unsave <post id>
recent
show <post id>
more
search [<term>]
help
quit";

const SIGNUP_USAGE: &str = "signup <name> <username> <email> <password>";
const SIGNIN_USAGE: &str = "signin <email> <password>";
const EDIT_USAGE: &str = "edit <post id> [<caption> [| <tags> [| <location> [| <image path>]]]]";

/// Post fields separated by `|`. `None` means the segment was left out.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostArgs {
    pub caption: Option<String>,
    pub tags: Option<String>,
    pub location: Option<String>,
    pub image: Option<PathBuf>,
}

impl PostArgs {
    fn parse(rest: &str) -> Self {
        if rest.trim().is_empty() {
            return Self::default();
        }

        let mut segments = rest.split('|').map(|segment| segment.trim().to_owned());
        Self {
            caption: segments.next(),
            tags: segments.next(),
            location: segments.next(),
            image: segments
                .next()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Command {
    SignUp(NewUser),
    SignIn(Credentials),
    SignOut,
    WhoAmI,
    Post(PostArgs),
    Edit {
        post_id: Id<PostMarker>,
        args: PostArgs,
    },
    Delete(Id<PostMarker>),
    Like(Id<PostMarker>),
    Save(Id<PostMarker>),
    Unsave(Id<PostMarker>),
    Recent,
    Show(Id<PostMarker>),
    More,
    /// Raw search box contents, possibly empty.
    Search(String),
    Help,
    Quit,
}

fn post_id(rest: &str, usage: &'static str) -> Result<Id<PostMarker>, CommandError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(id), None) => Ok(Id::new(id)),
        _ => Err(CommandError::Usage(usage)),
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_start();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        let command = match name {
            "signup" => {
                let mut words = rest.split_whitespace().collect::<Vec<_>>();
                if words.len() < 4 {
                    return Err(CommandError::Usage(SIGNUP_USAGE));
                }
                let account = words.split_off(words.len() - 3);
                let [username, email, password] = account.as_slice() else {
                    return Err(CommandError::Usage(SIGNUP_USAGE));
                };
                Command::SignUp(NewUser {
                    name: words.join(" "),
                    username: (*username).to_owned(),
                    email: (*email).to_owned(),
                    password: (*password).to_owned(),
                })
            }
            "signin" => {
                let words = rest.split_whitespace().collect::<Vec<_>>();
                let [email, password] = words.as_slice() else {
                    return Err(CommandError::Usage(SIGNIN_USAGE));
                };
                Command::SignIn(Credentials {
                    email: (*email).to_owned(),
                    password: (*password).to_owned(),
                })
            }
            "signout" => Command::SignOut,
            "whoami" => Command::WhoAmI,
            "post" => Command::Post(PostArgs::parse(rest)),
            "edit" => {
                let rest = rest.trim_start();
                let (id, fields) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if id.is_empty() {
                    return Err(CommandError::Usage(EDIT_USAGE));
                }
                Command::Edit {
                    post_id: Id::new(id),
                    args: PostArgs::parse(fields),
                }
            }
            "delete" => Command::Delete(post_id(rest, "delete <post id>")?),
            "like" => Command::Like(post_id(rest, "like <post id>")?),
            "save" => Command::Save(post_id(rest, "save <post id>")?),
            "unsave" => Command::Unsave(post_id(rest, "unsave <post id>")?),
            "recent" => Command::Recent,
            "show" => Command::Show(post_id(rest, "show <post id>")?),
            "more" => Command::More,
            "search" => Command::Search(rest.to_owned()),
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        };

        Ok(command)
    }
}
