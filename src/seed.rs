use log::info;

use crate::error::AppError;
use crate::store::{NewComment, NewPost, NewProfile, NewUser, Store};

/// Shape of the demo data set.
#[derive(Clone, Copy, Debug)]
pub struct SeedPlan {
    pub users: usize,
    pub posts_per_user: usize,
    pub comments_per_post: usize,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            users: 10,
            posts_per_user: 3,
            comments_per_post: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub profiles: usize,
    pub posts: usize,
    pub comments: usize,
}

/// Every user gets a profile and `posts_per_user` posts; comments on a post
/// are written by earlier users in rotation, so commenter and author differ.
pub async fn seed_demo_data(store: &Store, plan: SeedPlan) -> Result<SeedSummary, AppError> {
    let mut summary = SeedSummary::default();
    let mut user_ids = Vec::with_capacity(plan.users);

    for i in 1..=plan.users {
        let user = store
            .create_user(NewUser {
                name: format!("User {}", i),
                email: format!("user{}@example.com", i),
            })
            .await?;
        user_ids.push(user.id);
        summary.users += 1;

        store
            .create_profile(NewProfile {
                user_id: user.id,
                bio: Some(format!("Bio for user {}", i)),
                avatar_url: Some(format!("https://example.com/avatar{}.jpg", i)),
                birth_date: None,
            })
            .await?;
        summary.profiles += 1;

        for j in 1..=plan.posts_per_user {
            let post = store
                .create_post(NewPost {
                    user_id: user.id,
                    title: format!("Post {} by User {}", j, i),
                    content: format!("Content of post {} by user {}", j, i),
                })
                .await?;
            summary.posts += 1;

            for k in 1..=plan.comments_per_post {
                store
                    .create_comment(NewComment {
                        post_id: post.id,
                        user_id: user_ids[k % user_ids.len()],
                        content: format!("Comment {} on post {}", k, j),
                    })
                    .await?;
                summary.comments += 1;
            }
        }
    }

    info!(
        "seeded {} users, {} profiles, {} posts, {} comments",
        summary.users, summary.profiles, summary.posts, summary.comments
    );
    Ok(summary)
}

/// Seeds only into an empty `users` table.
pub async fn seed_if_empty(store: &Store, plan: SeedPlan) -> Result<Option<SeedSummary>, AppError> {
    if store.count_users().await? > 0 {
        info!("demo data skipped, users table is not empty");
        return Ok(None);
    }
    seed_demo_data(store, plan).await.map(Some)
}
