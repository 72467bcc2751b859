//! Line-based terminal front end over the query layer.

use command::{Command, HELP, PostArgs};
use render::Output;
use snapgram_client::{
    debounce::{DebounceInput, Debounced, debounce},
    error::ClientError,
    feed::FeedController,
    query::QueryClient,
};
use snapgram_common::{
    file::{AcceptedFile, FileRejection, accept_files},
    form::{PostFieldsInput, PostForm},
    model::{
        Id,
        post::{Post, PostMarker},
        user::User,
    },
};
use snapgram_remote::client::RemoteApi;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, warn};

mod command;
mod render;

#[derive(Debug, Error)]
pub enum ReplError {
    #[error("Error reading or writing the terminal: {0}")]
    Io(#[from] std::io::Error),
    #[error("Output could not be serialized: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum CommandError {
    #[error("Unknown command {0}, try help")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Sign in first")]
    NotSignedIn,
    #[error("Only the creator can change post {0}")]
    NotCreator(Id<PostMarker>),
    #[error("Post {0} is not saved")]
    NotSaved(Id<PostMarker>),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<FileRejection> for CommandError {
    fn from(value: FileRejection) -> Self {
        CommandError::Client(value.into())
    }
}

enum Flow {
    Continue(Vec<Output>),
    Quit,
}

struct Session<R> {
    client: QueryClient<R>,
    feed: FeedController,
    search: DebounceInput<String>,
}

impl<R: RemoteApi> Session<R> {
    fn new(client: QueryClient<R>, search: DebounceInput<String>) -> Self {
        Self {
            client,
            feed: FeedController::new(),
            search,
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue(Vec::new());
        }

        let command = match line.parse::<Command>() {
            Ok(Command::Quit) => return Flow::Quit,
            Ok(command) => command,
            Err(err) => return Flow::Continue(vec![Output::from(&err)]),
        };
        debug!(?command, "Running command");

        match self.execute(command).await {
            Ok(outputs) => Flow::Continue(outputs),
            Err(err) => {
                if matches!(&err, CommandError::Client(client) if !client.is_local()) {
                    warn!(error = %err, "Command failed");
                } else {
                    debug!(error = %err, "Command rejected");
                }
                Flow::Continue(vec![Output::from(&err)])
            }
        }
    }

    /// The signed-in account, asked of the service directly rather than the cache.
    async fn signed_in(&self) -> Result<User, CommandError> {
        self.client
            .api()
            .get_current_user()
            .await
            .map_err(ClientError::from)?
            .ok_or(CommandError::NotSignedIn)
    }

    async fn load_post(&self, post_id: &Id<PostMarker>) -> Result<Post, CommandError> {
        self.client
            .post_by_id(post_id)
            .await?
            .ok_or(CommandError::Usage("show <post id>"))
    }

    async fn owned_post(&self, post_id: &Id<PostMarker>) -> Result<Post, CommandError> {
        let user = self.signed_in().await?;
        let post = self.load_post(post_id).await?;
        if post.creator != user.id {
            return Err(CommandError::NotCreator(post_id.clone()));
        }
        Ok(post)
    }

    async fn execute(&mut self, command: Command) -> Result<Vec<Output>, CommandError> {
        let output = match command {
            Command::SignUp(user) => Output::User {
                user: Some(self.client.create_account(&user).await?),
            },
            Command::SignIn(credentials) => Output::Session {
                user_id: self.client.sign_in(&credentials).await?.user_id,
            },
            Command::SignOut => {
                self.client.sign_out().await?;
                Output::message("Signed out")
            }
            Command::WhoAmI => Output::User {
                user: self.client.current_user().await?,
            },
            Command::Post(args) => {
                let author = self.signed_in().await?.id;
                let form = PostForm::Create {
                    author,
                    image: accept_image(args.image.clone())?,
                    fields: fields_or(args, PostFieldsInput::default()),
                };
                Output::Post {
                    post: self.client.submit_post(form).await?,
                }
            }
            Command::Edit { post_id, args } => {
                let existing = self.owned_post(&post_id).await?;
                let form = PostForm::Update {
                    post_id,
                    image: accept_image(args.image.clone())?,
                    fields: fields_or(args, PostFieldsInput::from_post(&existing)),
                };
                Output::Post {
                    post: self.client.submit_post(form).await?,
                }
            }
            Command::Delete(post_id) => {
                let post = self.owned_post(&post_id).await?;
                let image_id = post.image.as_ref().map(|image| &image.id);
                self.client.delete_post(&post_id, image_id).await?;
                Output::message(format!("Deleted post {post_id}"))
            }
            Command::Like(post_id) => {
                let user = self.signed_in().await?;
                let post = self.load_post(&post_id).await?;
                let likes = post.likes.toggled(&user.id);
                Output::Post {
                    post: self.client.like_post(&post_id, &likes).await?,
                }
            }
            Command::Save(post_id) => {
                let user = self.signed_in().await?;
                Output::Saved {
                    saved: self.client.save_post(&post_id, &user.id).await?,
                }
            }
            Command::Unsave(post_id) => {
                let user = self.signed_in().await?;
                let record = user
                    .saved_record(&post_id)
                    .ok_or_else(|| CommandError::NotSaved(post_id.clone()))?;
                self.client.delete_saved_post(&record.id).await?;
                Output::message(format!("Removed post {post_id} from saved posts"))
            }
            Command::Recent => Output::Posts {
                posts: self.client.recent_posts().await?,
            },
            Command::Show(post_id) => Output::Post {
                post: self.load_post(&post_id).await?,
            },
            Command::More => self.more().await?,
            Command::Search(term) => {
                self.feed.set_search_term(&term);
                let cleared = term.is_empty();
                self.search.set(term);
                if !cleared {
                    return Ok(Vec::new());
                }
                Output::message("Search cleared")
            }
            Command::Help => Output::message(HELP),
            Command::Quit => return Ok(Vec::new()),
        };

        Ok(vec![output])
    }

    async fn more(&mut self) -> Result<Output, CommandError> {
        if self.feed.state().search_active {
            return Ok(Output::message("Clear the search to load more posts"));
        }

        let Some(pages) = self.feed.drive(&self.client).await? else {
            return Ok(Output::message("No more posts"));
        };

        Ok(Output::Page {
            page: pages.pages().len(),
            posts: pages.pages().last().cloned().unwrap_or_default(),
            has_next_page: pages.has_next_page(),
        })
    }
}

fn accept_image(path: Option<PathBuf>) -> Result<Option<AcceptedFile>, CommandError> {
    let Some(path) = path else {
        return Ok(None);
    };
    Ok(accept_files([path])?.into_iter().next())
}

/// Fills the segments left out of `args` from `defaults`.
fn fields_or(args: PostArgs, defaults: PostFieldsInput) -> PostFieldsInput {
    PostFieldsInput {
        caption: args.caption.unwrap_or(defaults.caption),
        tags: args.tags.unwrap_or(defaults.tags),
        location: args.location.unwrap_or(defaults.location),
    }
}

async fn search_worker<R: RemoteApi>(
    client: QueryClient<R>,
    mut terms: Debounced<String>,
    results: mpsc::UnboundedSender<Output>,
) {
    while let Some(term) = terms.next().await {
        let output = match client.search_posts(&term).await {
            Ok(Some(posts)) => Output::SearchResults { term, posts },
            Ok(None) => continue,
            Err(err) => Output::from(&CommandError::from(err)),
        };
        if results.send(output).is_err() {
            break;
        }
    }
}

async fn write_outputs<O>(output: &mut O, outputs: &[Output]) -> Result<(), ReplError>
where
    O: AsyncWrite + Unpin,
{
    for line in outputs {
        output.write_all(line.to_line()?.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await?;

    Ok(())
}

/// Reads commands from `input` until it ends or `quit`, writing JSON lines to `output`.
///
/// Search terms are debounced by `search_delay`; their results are written
/// whenever they arrive.
pub async fn run<R, I, O>(
    client: QueryClient<R>,
    search_delay: Duration,
    input: I,
    mut output: O,
) -> Result<(), ReplError>
where
    R: RemoteApi + 'static,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (search, terms) = debounce(String::new(), search_delay);
    let (results_tx, mut results) = mpsc::unbounded_channel();
    let worker = tokio::spawn(search_worker(client.clone(), terms, results_tx));

    let mut session = Session::new(client, search);
    let mut lines = BufReader::new(input).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match session.handle_line(&line).await {
                    Flow::Continue(outputs) => write_outputs(&mut output, &outputs).await?,
                    Flow::Quit => break,
                }
            }
            Some(found) = results.recv() => {
                write_outputs(&mut output, &[found]).await?;
            }
        }
    }

    drop(session);
    while let Some(found) = results.recv().await {
        write_outputs(&mut output, &[found]).await?;
    }
    if let Err(err) = worker.await {
        warn!(error = %err, "Search worker stopped abnormally");
    }

    Ok(())
}
