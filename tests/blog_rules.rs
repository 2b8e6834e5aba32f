mod common;

use blogicum::error::BlogError;
use blogicum::helper::blog_helpers;
use blogicum::helper::form_helpers::{CommentForm, RegistrationForm, Submission, UserForm};
use blogicum::models::db_operations::{comments_db_operations, posts_db_operations, users_db_operations};
use blogicum::models::PostAction;
use chrono::Duration;
use common::*;

#[test]
fn front_page_lists_only_public_posts_newest_first() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    let secret = add_category(&conn, "secret", false);

    add_post(&conn, &anna, NewPost::published("Old", days_ago(3)).in_category(travel));
    add_post(&conn, &anna, NewPost::published("No category", days_ago(1)));
    add_post(&conn, &anna, NewPost::published("Recent", days_ago(1)).in_category(travel));
    add_post(&conn, &anna, NewPost::published("Draft", days_ago(2)).hidden());
    add_post(&conn, &anna, NewPost::published("Scheduled", now() + Duration::days(1)));
    add_post(&conn, &anna, NewPost::published("In hidden category", days_ago(1)).in_category(secret));

    let page = blog_helpers::list_public_posts(&conn, now(), None).unwrap();
    assert_eq!(titles(&page.items), vec!["Recent", "Old"]);
    assert_eq!(page.count, 2);
    assert_eq!(page.num_pages, 1);
}

#[test]
fn post_published_exactly_now_is_visible() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    add_post(&conn, &anna, NewPost::published("On time", now()).in_category(travel));

    let page = blog_helpers::list_public_posts(&conn, now(), None).unwrap();
    assert_eq!(titles(&page.items), vec!["On time"]);
}

#[test]
fn category_page_requires_a_published_category() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    let food = add_category(&conn, "food", true);
    add_category(&conn, "secret", false);
    add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)).in_category(travel));
    add_post(&conn, &anna, NewPost::published("Soup", days_ago(1)).in_category(food));
    add_post(&conn, &anna, NewPost::published("Later", now() + Duration::hours(1)).in_category(travel));

    let (category, page) = blog_helpers::list_category_posts(&conn, "travel", now(), None).unwrap();
    assert_eq!(category.slug, "travel");
    assert_eq!(titles(&page.items), vec!["Alps"]);

    assert!(matches!(
        blog_helpers::list_category_posts(&conn, "secret", now(), None),
        Err(BlogError::NotFound)
    ));
    assert!(matches!(
        blog_helpers::list_category_posts(&conn, "missing", now(), None),
        Err(BlogError::NotFound)
    ));
}

#[test]
fn profile_owner_sees_everything_others_see_public_posts() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let travel = add_category(&conn, "travel", true);
    let secret = add_category(&conn, "secret", false);
    add_post(&conn, &anna, NewPost::published("Public", days_ago(2)).in_category(travel));
    add_post(&conn, &anna, NewPost::published("Draft", days_ago(1)).hidden());
    add_post(&conn, &anna, NewPost::published("Scheduled", now() + Duration::days(2)));
    add_post(&conn, &anna, NewPost::published("Hidden category", days_ago(3)).in_category(secret));
    add_post(&conn, &boris, NewPost::published("Boris post", days_ago(1)).in_category(travel));

    let (_, own) = blog_helpers::list_profile_posts(&conn, "anna", Some(&anna), now(), None).unwrap();
    assert_eq!(titles(&own.items), vec!["Scheduled", "Draft", "Public", "Hidden category"]);

    let (_, seen_by_boris) = blog_helpers::list_profile_posts(&conn, "anna", Some(&boris), now(), None).unwrap();
    assert_eq!(titles(&seen_by_boris.items), vec!["Public"]);

    let (profile, anonymous) = blog_helpers::list_profile_posts(&conn, "anna", None, now(), None).unwrap();
    assert_eq!(profile.username, "anna");
    assert_eq!(titles(&anonymous.items), vec!["Public"]);

    assert!(matches!(
        blog_helpers::list_profile_posts(&conn, "nobody", None, now(), None),
        Err(BlogError::NotFound)
    ));
}

#[test]
fn uncategorised_post_stays_off_public_listings() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    add_post(&conn, &anna, NewPost::published("No category", days_ago(1)));

    assert!(blog_helpers::list_public_posts(&conn, now(), None).unwrap().items.is_empty());

    let (_, seen_by_boris) = blog_helpers::list_profile_posts(&conn, "anna", Some(&boris), now(), None).unwrap();
    assert!(seen_by_boris.items.is_empty());
    let (_, anonymous) = blog_helpers::list_profile_posts(&conn, "anna", None, now(), None).unwrap();
    assert!(anonymous.items.is_empty());

    let (_, own) = blog_helpers::list_profile_posts(&conn, "anna", Some(&anna), now(), None).unwrap();
    assert_eq!(titles(&own.items), vec!["No category"]);
}

#[test]
fn unpublished_post_detail_is_only_for_its_author() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let draft = add_post(&conn, &anna, NewPost::published("Draft", days_ago(1)).hidden());

    assert!(matches!(blog_helpers::get_post_detail(&conn, draft, None), Err(BlogError::NotFound)));
    assert!(matches!(blog_helpers::get_post_detail(&conn, draft, Some(&boris)), Err(BlogError::NotFound)));
    let (post, comments) = blog_helpers::get_post_detail(&conn, draft, Some(&anna)).unwrap();
    assert_eq!(post.title, "Draft");
    assert!(comments.is_empty());

    assert!(matches!(blog_helpers::get_post_detail(&conn, 9999, Some(&anna)), Err(BlogError::NotFound)));
}

#[test]
fn scheduled_post_is_reachable_by_direct_link() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let secret = add_category(&conn, "secret", false);
    let scheduled = add_post(&conn, &anna, NewPost::published("Scheduled", now() + Duration::days(5)));
    let in_hidden = add_post(&conn, &anna, NewPost::published("Hidden category", days_ago(1)).in_category(secret));

    assert!(blog_helpers::get_post_detail(&conn, scheduled, None).is_ok());
    assert!(blog_helpers::get_post_detail(&conn, in_hidden, None).is_ok());
}

#[test]
fn comments_are_listed_in_writing_order() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post = add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)));
    add_comment(&conn, &boris, post, "first");
    add_comment(&conn, &anna, post, "second");
    add_comment(&conn, &boris, post, "third");

    let (post, comments) = blog_helpers::get_post_detail(&conn, post, None).unwrap();
    let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(post.comment_count, 3);
}

#[test]
fn non_owner_cannot_edit_or_delete_a_post() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)));

    let mut changed = draft(&NewPost::published("Boris was here", days_ago(1)));
    changed.text = "Overwritten".into();

    match blog_helpers::update_post(&conn, &boris, post_id, &changed) {
        Err(BlogError::PermissionDenied { redirect_to }) => assert_eq!(redirect_to, format!("/posts/{}/", post_id)),
        other => panic!("expected a redirect, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        blog_helpers::load_post_for(&conn, &boris, post_id, PostAction::Edit),
        Err(BlogError::PermissionDenied { .. })
    ));
    assert!(matches!(blog_helpers::delete_post(&conn, &boris, post_id), Err(BlogError::NotFound)));

    let post = posts_db_operations::read_post(&conn, post_id).unwrap().unwrap();
    assert_eq!(post.title, "Alps");
    assert_eq!(post.text, "Text of Alps");

    blog_helpers::update_post(&conn, &anna, post_id, &changed).unwrap();
    let post = posts_db_operations::read_post(&conn, post_id).unwrap().unwrap();
    assert_eq!(post.title, "Boris was here");
    assert_eq!(post.author_id, anna.id);
}

#[test]
fn deleting_a_post_removes_its_comments() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let post_id = add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)));
    let comment_id = add_comment(&conn, &anna, post_id, "nice");

    let deleted = blog_helpers::delete_post(&conn, &anna, post_id).unwrap();
    assert_eq!(deleted.id, post_id);
    assert!(posts_db_operations::read_post(&conn, post_id).unwrap().is_none());
    assert!(comments_db_operations::read_comment(&conn, comment_id).unwrap().is_none());
}

#[test]
fn blank_comment_is_rejected_without_storing_anything() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let post_id = add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)));

    let outcome = blog_helpers::add_comment(&conn, &anna, post_id, &CommentForm { text: "  ".into() }).unwrap();
    match outcome {
        Submission::Rejected(errors) => assert!(errors.contains_key("text")),
        Submission::Saved(_) => panic!("blank comment was stored"),
    }
    assert!(comments_db_operations::read_comments_for_post(&conn, post_id).unwrap().is_empty());

    assert!(matches!(
        blog_helpers::add_comment(&conn, &anna, 9999, &CommentForm { text: "hello".into() }),
        Err(BlogError::NotFound)
    ));
}

#[test]
fn only_the_comment_author_may_change_it() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, NewPost::published("Alps", days_ago(1)));
    let other_post = add_post(&conn, &anna, NewPost::published("Soup", days_ago(1)));
    let comment_id = add_comment(&conn, &boris, post_id, "by boris");

    // The post author has no say over comments written by others.
    assert!(matches!(
        blog_helpers::delete_comment(&conn, &anna, post_id, comment_id),
        Err(BlogError::NotFound)
    ));
    assert!(matches!(
        blog_helpers::edit_comment(&conn, &anna, post_id, comment_id, &CommentForm { text: "edited".into() }),
        Err(BlogError::NotFound)
    ));
    // Addressed under the wrong post.
    assert!(matches!(
        blog_helpers::delete_comment(&conn, &boris, other_post, comment_id),
        Err(BlogError::NotFound)
    ));
    assert_eq!(comments_db_operations::read_comment(&conn, comment_id).unwrap().unwrap().text, "by boris");

    let outcome =
        blog_helpers::edit_comment(&conn, &boris, post_id, comment_id, &CommentForm { text: "edited".into() }).unwrap();
    assert!(matches!(outcome, Submission::Saved(())));
    assert_eq!(comments_db_operations::read_comment(&conn, comment_id).unwrap().unwrap().text, "edited");

    blog_helpers::delete_comment(&conn, &boris, post_id, comment_id).unwrap();
    assert!(comments_db_operations::read_comment(&conn, comment_id).unwrap().is_none());
}

#[test]
fn deleting_own_comment_leaves_the_post_and_other_comments() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &boris, NewPost::published("Alps", days_ago(1)));
    let mine = add_comment(&conn, &anna, post_id, "by anna");
    let theirs = add_comment(&conn, &boris, post_id, "by boris");

    blog_helpers::delete_comment(&conn, &anna, post_id, mine).unwrap();

    assert!(comments_db_operations::read_comment(&conn, mine).unwrap().is_none());
    assert_eq!(comments_db_operations::read_comment(&conn, theirs).unwrap().unwrap().text, "by boris");
    let post = posts_db_operations::read_post(&conn, post_id).unwrap().unwrap();
    assert_eq!(post.title, "Alps");
    assert_eq!(post.comment_count, 1);
}

#[test]
fn listing_pages_clamp_out_of_range_numbers() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    for day in 1..=12 {
        let title = format!("Post {}", day);
        add_post(&conn, &anna, NewPost::published(&title, days_ago(day)).in_category(travel));
    }

    let first = blog_helpers::list_public_posts(&conn, now(), None).unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].title, "Post 1");
    assert!(first.has_next);

    let last = blog_helpers::list_public_posts(&conn, now(), Some("99")).unwrap();
    assert_eq!(last.number, 2);
    assert_eq!(titles(&last.items), vec!["Post 11", "Post 12"]);
    assert!(!last.has_next);

    assert_eq!(blog_helpers::list_public_posts(&conn, now(), Some("abc")).unwrap().number, 1);
    assert_eq!(blog_helpers::list_public_posts(&conn, now(), Some("0")).unwrap().number, 1);
}

#[test]
fn empty_listing_is_a_single_empty_page() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();

    let page = blog_helpers::list_public_posts(&conn, now(), Some("3")).unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.num_pages, 1);
    assert!(page.items.is_empty());
}

#[test]
fn post_form_rejects_unknown_choices() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let travel = add_category(&conn, "travel", true);
    let form = blogicum::helper::form_helpers::PostForm {
        title: "Alps".into(),
        text: "Snow".into(),
        pub_date: "2024-04-01".into(),
        category: Some(travel + 100),
        location: Some(42),
        ..Default::default()
    };

    let errors = blog_helpers::validate_post_form(&conn, &form, Default::default()).unwrap();
    assert!(errors.contains_key("category"));
    assert!(errors.contains_key("location"));
    assert!(!errors.contains_key("title"));

    let valid = blogicum::helper::form_helpers::PostForm { category: Some(travel), location: None, ..form };
    assert!(blog_helpers::validate_post_form(&conn, &valid, Default::default()).unwrap().is_empty());
}

#[test]
fn profile_username_must_stay_unique() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user(&conn, "anna");
    add_user(&conn, "boris");

    let taken = UserForm { username: "boris".into(), ..UserForm::default() };
    match blog_helpers::update_profile(&conn, &anna, &taken).unwrap() {
        Submission::Rejected(errors) => assert!(errors.contains_key("username")),
        Submission::Saved(_) => panic!("duplicate username accepted"),
    }

    let renamed = UserForm {
        first_name: "Anna".into(),
        last_name: "Karenina".into(),
        username: "anna.k".into(),
        email: "anna@example.com".into(),
    };
    match blog_helpers::update_profile(&conn, &anna, &renamed).unwrap() {
        Submission::Saved(username) => assert_eq!(username, "anna.k"),
        Submission::Rejected(errors) => panic!("unexpected errors: {:?}", errors),
    }
    let user = blog_helpers::require_user(&conn, anna.id).unwrap();
    assert_eq!(user.full_name(), "Anna Karenina");
    assert_eq!(user.username, "anna.k");
}

#[test]
fn registration_refuses_a_taken_username() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    add_user(&conn, "anna");

    let form = RegistrationForm {
        username: "anna".into(),
        email: String::new(),
        password1: "long enough".into(),
        password2: "long enough".into(),
    };
    match blog_helpers::register_user(&conn, &form).unwrap() {
        Submission::Rejected(errors) => assert!(errors.contains_key("username")),
        Submission::Saved(_) => panic!("duplicate user registered"),
    }
}

#[test]
fn credential_check_reports_store_failures() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let anna = add_user_with_password(&conn, "anna", "correct horse");

    assert_eq!(
        users_db_operations::verify_credentials(&conn, "anna", "correct horse").unwrap(),
        Some((anna.id, "anna".to_string()))
    );
    assert_eq!(users_db_operations::verify_credentials(&conn, "anna", "wrong").unwrap(), None);
    assert_eq!(users_db_operations::verify_credentials(&conn, "nobody", "wrong").unwrap(), None);

    conn.execute_batch("DROP TABLE users;").unwrap();
    assert!(users_db_operations::verify_credentials(&conn, "anna", "correct horse").is_err());
}
